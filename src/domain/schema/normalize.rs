//! Schema document normalization
//!
//! Accepted shapes:
//! - a field list: `[{ "name": "x", ... }]` or `{ "fields": [...] }`
//! - a legacy placeholders object: `{ "placeholders": { "x": definition } }` or a
//!   bare `{ "x": definition }`, where `definition` is either a type name string or an
//!   object with `type`, `required` and `description`. Placeholders are
//!   required unless they say otherwise.

use serde_json::{Map, Value};

use super::field::{FieldType, SchemaField};
use crate::domain::DomainError;

/// Normalize any accepted schema document into a list of field specs
pub fn normalize_schema(schema: &Value) -> Result<Vec<SchemaField>, DomainError> {
    match schema {
        Value::Array(_) => parse_field_list(schema),
        Value::Object(map) => {
            if let Some(fields) = map.get("fields") {
                return parse_field_list(fields);
            }

            match map.get("placeholders") {
                Some(Value::Object(placeholders)) => parse_placeholders(placeholders),
                Some(_) => Err(DomainError::validation(
                    "Schema 'placeholders' must be an object",
                )),
                None => parse_placeholders(map),
            }
        }
        _ => Err(DomainError::validation(
            "Schema must be a field list or a placeholders object",
        )),
    }
}

fn parse_field_list(value: &Value) -> Result<Vec<SchemaField>, DomainError> {
    serde_json::from_value(value.clone())
        .map_err(|e| DomainError::validation(format!("Invalid schema field list: {}", e)))
}

fn parse_placeholders(placeholders: &Map<String, Value>) -> Result<Vec<SchemaField>, DomainError> {
    placeholders
        .iter()
        .map(|(name, definition)| parse_placeholder(name, definition))
        .collect()
}

fn parse_placeholder(name: &str, definition: &Value) -> Result<SchemaField, DomainError> {
    match definition {
        Value::String(type_name) => Ok(SchemaField {
            field_type: Some(parse_type(name, type_name)?),
            ..SchemaField::required(name)
        }),
        Value::Object(attrs) => {
            let field_type = match attrs.get("type") {
                Some(Value::String(type_name)) => Some(parse_type(name, type_name)?),
                Some(Value::Null) | None => None,
                Some(other) => {
                    return Err(DomainError::validation(format!(
                        "Placeholder '{}' has a non-string type: {}",
                        name, other
                    )));
                }
            };

            let required = attrs
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(true);

            let description = attrs
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);

            Ok(SchemaField {
                name: name.to_string(),
                field_type,
                required,
                description,
            })
        }
        Value::Null => Ok(SchemaField::required(name)),
        other => Err(DomainError::validation(format!(
            "Placeholder '{}' must be a type name or an object, got {}",
            name, other
        ))),
    }
}

fn parse_type(name: &str, type_name: &str) -> Result<FieldType, DomainError> {
    FieldType::parse(type_name).ok_or_else(|| {
        DomainError::validation(format!(
            "Placeholder '{}' has unsupported type '{}'",
            name, type_name
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_list_array() {
        let fields = normalize_schema(&json!([
            {"name": "title", "type": "string", "required": true},
            {"name": "count", "type": "number"}
        ]))
        .unwrap();

        assert_eq!(fields.len(), 2);
        assert!(fields[0].required);
        assert!(!fields[1].required);
        assert_eq!(fields[1].field_type, Some(FieldType::Number));
    }

    #[test]
    fn test_fields_wrapper() {
        let fields = normalize_schema(&json!({"fields": [{"name": "x", "required": true}]})).unwrap();
        assert_eq!(fields, vec![SchemaField::required("x")]);
    }

    #[test]
    fn test_legacy_placeholders() {
        let fields = normalize_schema(&json!({
            "placeholders": {
                "topic": {"type": "string", "description": "What to write about"},
                "limit": {"type": "integer", "required": false},
                "tags": "array"
            }
        }))
        .unwrap();

        let topic = fields.iter().find(|f| f.name == "topic").unwrap();
        assert!(topic.required);
        assert_eq!(topic.description.as_deref(), Some("What to write about"));

        let limit = fields.iter().find(|f| f.name == "limit").unwrap();
        assert!(!limit.required);
        assert_eq!(limit.field_type, Some(FieldType::Number));

        let tags = fields.iter().find(|f| f.name == "tags").unwrap();
        assert_eq!(tags.field_type, Some(FieldType::Array));
    }

    #[test]
    fn test_bare_placeholders_object() {
        let fields = normalize_schema(&json!({"name": {"type": "string"}})).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "name");
        assert!(fields[0].required);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = normalize_schema(&json!({"when": "date"}));
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_scalar_schema_is_rejected() {
        assert!(normalize_schema(&json!(42)).is_err());
    }
}
