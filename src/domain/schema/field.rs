//! Field schema types shared by the extractor and validator

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of value types a schema field can require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    #[serde(alias = "integer")]
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// Check whether a JSON value satisfies this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    /// Parse a type name, accepting the same aliases as deserialization
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "string" => Some(Self::String),
            "number" | "integer" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the JSON type of a value, as reported in type mismatches
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Declared specification of a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,

    /// Expected value type; `None` accepts any value
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaField {
    /// Create a required field accepting any type
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            required: true,
            description: None,
        }
    }

    /// Create an optional field accepting any type
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name)
        }
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Combined input/output contract statically derived from a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSchema {
    /// Fields the template reads
    pub inputs: Vec<SchemaField>,

    /// Fields the template declares it produces
    pub outputs: Vec<SchemaField>,
}

impl UnifiedSchema {
    pub fn input(&self, name: &str) -> Option<&SchemaField> {
        self.inputs.iter().find(|f| f.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&SchemaField> {
        self.outputs.iter().find(|f| f.name == name)
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Category of a validation violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    Missing,
    TypeMismatch,
}

/// A single violation found while validating a data document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub kind: ValidationErrorKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<FieldType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl ValidationError {
    pub fn missing(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("Required field '{}' is missing", field),
            field,
            kind: ValidationErrorKind::Missing,
            expected: None,
            actual: None,
        }
    }

    pub fn type_mismatch(field: impl Into<String>, expected: FieldType, value: &Value) -> Self {
        let field = field.into();
        let actual = json_type_name(value);
        Self {
            message: format!(
                "Field '{}' expected type {} but got {}",
                field, expected, actual
            ),
            field,
            kind: ValidationErrorKind::TypeMismatch,
            expected: Some(expected),
            actual: Some(actual.to_string()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_type_matches() {
        assert!(FieldType::Number.matches(&json!(0)));
        assert!(FieldType::Number.matches(&json!(1.5)));
        assert!(!FieldType::Number.matches(&json!("1")));
        assert!(FieldType::Array.matches(&json!([])));
        assert!(FieldType::Object.matches(&json!({})));
        assert!(FieldType::Boolean.matches(&json!(false)));
    }

    #[test]
    fn test_integer_alias() {
        let field: SchemaField =
            serde_json::from_value(json!({"name": "count", "type": "integer"})).unwrap();
        assert_eq!(field.field_type, Some(FieldType::Number));
        assert!(!field.required);
        assert_eq!(FieldType::parse("Integer"), Some(FieldType::Number));
        assert_eq!(FieldType::parse("date"), None);
    }

    #[test]
    fn test_schema_field_serialization() {
        let field = SchemaField::required("title")
            .with_type(FieldType::String)
            .with_description("Document title");
        let value = serde_json::to_value(&field).unwrap();

        assert_eq!(
            value,
            json!({
                "name": "title",
                "type": "string",
                "required": true,
                "description": "Document title"
            })
        );
    }

    #[test]
    fn test_type_mismatch_message() {
        let error = ValidationError::type_mismatch("age", FieldType::Number, &json!("ten"));
        assert_eq!(error.kind, ValidationErrorKind::TypeMismatch);
        assert_eq!(error.actual.as_deref(), Some("string"));
        assert_eq!(error.to_string(), "Field 'age' expected type number but got string");
    }
}
