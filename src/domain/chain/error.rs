//! Chain execution errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::renderer::RenderError;
use crate::domain::schema::ValidationError;
use crate::domain::DomainError;

/// How a chain run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Completed,
    /// Stopped after the requested pause step
    Paused,
    /// Stopped at a checkpoint waiting for human input
    AwaitingInput,
}

/// Progress counters for a chain run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub steps_executed: usize,
    pub total_render_time_ms: u64,
    pub failed_steps: usize,
    pub status: ExecutionStatus,
}

/// Where in a run a failure happened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepContext {
    pub step_index: usize,
    pub step_id: String,
    pub template_path: String,
    pub workflow_id: String,
    pub summary: ExecutionSummary,
}

/// Stable classification of chain errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainErrorKind {
    ChainValidation,
    MissingInput,
    Render,
    NotFound,
    SchemaValidation,
    Store,
}

impl ChainErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChainValidation => "chain_validation",
            Self::MissingInput => "missing_input",
            Self::Render => "render",
            Self::NotFound => "not_found",
            Self::SchemaValidation => "schema_validation",
            Self::Store => "store",
        }
    }
}

/// Errors raised by the chain executor
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Invalid chain: {}", .problems.join("; "))]
    Validation { problems: Vec<String> },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Step '{}' is missing required input '{field}'", .context.step_id)]
    MissingInput {
        field: String,
        context: Box<StepContext>,
    },

    #[error("Step '{}' failed to render: {source}", .context.step_id)]
    Render {
        #[source]
        source: RenderError,
        context: Box<StepContext>,
    },

    #[error("Step '{}' failed schema validation: {}", .context.step_id, join_errors(.errors))]
    SchemaValidation {
        errors: Vec<ValidationError>,
        context: Box<StepContext>,
    },

    #[error("Store error: {source}")]
    Store {
        #[source]
        source: DomainError,
        context: Option<Box<StepContext>>,
    },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ChainError {
    pub fn validation(problems: Vec<String>) -> Self {
        Self::Validation { problems }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn missing_input(field: impl Into<String>, context: StepContext) -> Self {
        Self::MissingInput {
            field: field.into(),
            context: Box::new(context),
        }
    }

    pub fn render(source: RenderError, context: StepContext) -> Self {
        Self::Render {
            source,
            context: Box::new(context),
        }
    }

    pub fn schema_validation(errors: Vec<ValidationError>, context: StepContext) -> Self {
        Self::SchemaValidation {
            errors,
            context: Box::new(context),
        }
    }

    pub fn store(source: DomainError, context: Option<StepContext>) -> Self {
        Self::Store {
            source,
            context: context.map(Box::new),
        }
    }

    pub fn kind(&self) -> ChainErrorKind {
        match self {
            Self::Validation { .. } => ChainErrorKind::ChainValidation,
            Self::NotFound { .. } => ChainErrorKind::NotFound,
            Self::MissingInput { .. } => ChainErrorKind::MissingInput,
            Self::Render { .. } => ChainErrorKind::Render,
            Self::SchemaValidation { .. } => ChainErrorKind::SchemaValidation,
            Self::Store { .. } => ChainErrorKind::Store,
        }
    }

    /// Only render failures are worth retrying as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Render { .. })
    }

    pub fn context(&self) -> Option<&StepContext> {
        match self {
            Self::MissingInput { context, .. }
            | Self::Render { context, .. }
            | Self::SchemaValidation { context, .. } => Some(&**context),
            Self::Store { context, .. } => context.as_deref(),
            Self::Validation { .. } | Self::NotFound { .. } => None,
        }
    }

    pub fn step_index(&self) -> Option<usize> {
        self.context().map(|c| c.step_index)
    }

    pub fn step_id(&self) -> Option<&str> {
        self.context().map(|c| c.step_id.as_str())
    }

    pub fn template_path(&self) -> Option<&str> {
        self.context().map(|c| c.template_path.as_str())
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.context().map(|c| c.workflow_id.as_str())
    }

    pub fn summary(&self) -> Option<&ExecutionSummary> {
        self.context().map(|c| &c.summary)
    }
}

impl From<DomainError> for ChainError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { message } => Self::NotFound { message },
            DomainError::Validation { message } | DomainError::InvalidId { message } => {
                Self::Validation {
                    problems: vec![message],
                }
            }
            other => Self::store(other, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> StepContext {
        StepContext {
            step_index: 1,
            step_id: "draft".to_string(),
            template_path: "draft.hbs".to_string(),
            workflow_id: "wf-1".to_string(),
            summary: ExecutionSummary {
                steps_executed: 1,
                total_render_time_ms: 12,
                failed_steps: 1,
                status: ExecutionStatus::Completed,
            },
        }
    }

    #[test]
    fn test_only_render_is_retryable() {
        let render = ChainError::render(RenderError::runtime("draft.hbs", "boom"), context());
        assert!(render.is_retryable());
        assert_eq!(render.kind(), ChainErrorKind::Render);

        let missing = ChainError::missing_input("outline", context());
        assert!(!missing.is_retryable());
        assert_eq!(
            missing.to_string(),
            "Step 'draft' is missing required input 'outline'"
        );

        assert!(!ChainError::validation(vec!["bad".to_string()]).is_retryable());
        assert!(!ChainError::not_found("wf-9").is_retryable());
    }

    #[test]
    fn test_step_accessors() {
        let err = ChainError::missing_input("outline", context());
        assert_eq!(err.step_index(), Some(1));
        assert_eq!(err.step_id(), Some("draft"));
        assert_eq!(err.template_path(), Some("draft.hbs"));
        assert_eq!(err.workflow_id(), Some("wf-1"));
        assert_eq!(err.summary().map(|s| s.steps_executed), Some(1));

        let err = ChainError::validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Invalid chain: a; b");
        assert!(err.step_id().is_none());
    }

    #[test]
    fn test_domain_error_conversion() {
        let err: ChainError = DomainError::not_found("Workflow 'wf-x' not found").into();
        assert_eq!(err.kind(), ChainErrorKind::NotFound);

        let err: ChainError = DomainError::storage("disk full").into();
        assert_eq!(err.kind(), ChainErrorKind::Store);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(ExecutionStatus::AwaitingInput).unwrap(),
            serde_json::json!("awaiting_input")
        );
    }
}
