//! Service layer - entry points over the chain engine and schema tooling

mod analysis_service;
mod execution_service;

pub use analysis_service::{
    AnalysisError, AnalysisReport, AnalysisService, SchemaInput, TemplateInput, ValidationReport,
};
pub use execution_service::{ErrorBody, ErrorPayload, ExecuteRequest, ExecutionService};
