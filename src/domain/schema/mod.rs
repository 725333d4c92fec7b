//! Schema domain - template field extraction and data validation

mod extractor;
mod field;
mod normalize;
mod validator;

pub use extractor::{
    extract_unified_schema, is_builtin, split_front_matter, HelperCatalog, SchemaExtraction,
    SchemaExtractor, TemplateParseError, TemplateParts, BUILTIN_HELPERS,
};
pub use field::{
    json_type_name, FieldType, SchemaField, UnifiedSchema, ValidationError, ValidationErrorKind,
};
pub use normalize::normalize_schema;
pub use validator::{validate, validate_value, ValidationResult};
