//! Template rendering seam

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Output of one template render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedTemplate {
    /// A JSON object when the rendered text parses as one, otherwise a string
    pub output: Value,
    pub elapsed_ms: u64,
}

impl RenderedTemplate {
    pub fn new(output: Value, elapsed_ms: u64) -> Self {
        Self { output, elapsed_ms }
    }
}

/// Errors raised while loading or rendering a template
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("I/O error reading template '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Template not found: {path}")]
    NotFound { path: String },

    #[error("Template '{path}' failed to parse: {message}")]
    Parse { path: String, message: String },

    #[error("Template '{path}' failed to render: {message}")]
    Runtime { path: String, message: String },

    #[error("Template '{path}' timed out after {timeout_ms}ms")]
    Timeout { path: String, timeout_ms: u64 },
}

impl RenderError {
    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn runtime(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runtime {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn timeout(path: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            path: path.into(),
            timeout_ms,
        }
    }

    /// Short name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::NotFound { .. } => "not_found",
            Self::Parse { .. } => "parse",
            Self::Runtime { .. } => "runtime",
            Self::Timeout { .. } => "timeout",
        }
    }
}

/// Renders a template reference against the accumulated workflow data
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render(
        &self,
        template_path: &str,
        data: &Map<String, Value>,
    ) -> Result<RenderedTemplate, RenderError>;
}

/// Resolves template references to their source text
#[async_trait]
pub trait TemplateSource: Send + Sync + std::fmt::Debug {
    /// Read the full source of a template, front matter included
    async fn load(&self, reference: &str) -> Result<String, RenderError>;
}
