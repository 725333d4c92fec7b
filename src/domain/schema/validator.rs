//! Field schema validation
//!
//! Validation never fails: every violation is collected and returned so a
//! caller can report all of them in one pass.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::field::{SchemaField, ValidationError};

/// Outcome of validating a data document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate a data map against a list of field specifications
///
/// A field counts as absent when its key is missing or holds JSON `null`.
/// Falsy values such as `0`, `false` and `""` are present.
pub fn validate(data: &Map<String, Value>, fields: &[SchemaField]) -> ValidationResult {
    let mut errors = Vec::new();

    for field in fields {
        match data.get(&field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    errors.push(ValidationError::missing(&field.name));
                }
            }
            Some(value) => {
                if let Some(expected) = field.field_type {
                    if !expected.matches(value) {
                        errors.push(ValidationError::type_mismatch(&field.name, expected, value));
                    }
                }
            }
        }
    }

    ValidationResult::from_errors(errors)
}

/// Validate an arbitrary JSON document; non-object documents have no fields
pub fn validate_value(data: &Value, fields: &[SchemaField]) -> ValidationResult {
    match data {
        Value::Object(map) => validate(map, fields),
        _ => validate(&Map::new(), fields),
    }
}
