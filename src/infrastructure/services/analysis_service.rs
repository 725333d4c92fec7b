//! Analysis service - template contract extraction and data validation entry points

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::chain::{RenderError, TemplateSource};
use crate::domain::schema::{
    is_builtin, normalize_schema, validate, SchemaExtraction, SchemaExtractor, SchemaField,
    TemplateParseError, UnifiedSchema, ValidationError,
};
use crate::domain::DomainError;
use crate::infrastructure::template::HelperRegistry;

/// Errors raised by the analysis entry points
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Template(#[from] RenderError),

    #[error(transparent)]
    Parse(#[from] TemplateParseError),

    #[error(transparent)]
    Schema(#[from] DomainError),
}

/// What to analyse: a template reference or raw source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", untagged)]
pub enum TemplateInput {
    Reference {
        template: String,
    },
    Source {
        source: String,
        #[serde(default)]
        label: Option<String>,
    },
}

/// Schema to validate against: inline document or a template's inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaInput {
    Template { template: String },
    Inline(Value),
}

/// Result of analysing a template
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub schema: UnifiedSchema,
    pub required_helpers: Vec<String>,
    /// Required helpers that are neither built in nor registered
    pub unregistered_helpers: Vec<String>,
}

/// Result of validating a data document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub validation_time_ms: f64,
}

/// Template analysis entry points
#[derive(Debug)]
pub struct AnalysisService {
    templates: Arc<dyn TemplateSource>,
    helpers: Arc<HelperRegistry>,
}

impl AnalysisService {
    pub fn new(templates: Arc<dyn TemplateSource>, helpers: Arc<HelperRegistry>) -> Self {
        Self { templates, helpers }
    }

    fn extractor(&self) -> SchemaExtractor {
        SchemaExtractor::from_catalog(self.helpers.as_ref())
    }

    async fn extract(&self, input: &TemplateInput) -> Result<SchemaExtraction, AnalysisError> {
        match input {
            TemplateInput::Reference { template } => {
                let source = self.templates.load(template).await?;
                Ok(self.extractor().extract(&source, template)?)
            }
            TemplateInput::Source { source, label } => {
                let label = label.as_deref().unwrap_or("<inline>");
                Ok(self.extractor().extract(source, label)?)
            }
        }
    }

    /// Extract a template's unified schema and helper requirements
    pub async fn analyze(&self, input: &TemplateInput) -> Result<AnalysisReport, AnalysisError> {
        let extraction = self.extract(input).await?;
        let registered = self.helpers.snapshot();

        let unregistered_helpers = extraction
            .required_helpers
            .iter()
            .filter(|name| !is_builtin(name) && !registered.contains_key(name.as_str()))
            .cloned()
            .collect();

        Ok(AnalysisReport {
            schema: extraction.schema,
            required_helpers: extraction.required_helpers,
            unregistered_helpers,
        })
    }

    /// Validate `data` against an inline schema or a template's input fields
    pub async fn validate(
        &self,
        schema: &SchemaInput,
        data: &Map<String, Value>,
    ) -> Result<ValidationReport, AnalysisError> {
        let fields: Vec<SchemaField> = match schema {
            SchemaInput::Template { template } => {
                self.extract(&TemplateInput::Reference {
                    template: template.clone(),
                })
                .await?
                .schema
                .inputs
            }
            SchemaInput::Inline(document) => normalize_schema(document)?,
        };

        let started = Instant::now();
        let result = validate(data, &fields);
        let validation_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        Ok(ValidationReport {
            valid: result.valid,
            errors: result.errors,
            validation_time_ms,
        })
    }
}
