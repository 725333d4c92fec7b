//! Prompt chain domain - chain definitions and step-by-step execution

mod entity;
mod error;
mod executor;
mod renderer;
mod repository;

pub use entity::{ChainDefinition, ChainStep, StepCheckpoint};
pub use error::{ChainError, ChainErrorKind, ExecutionStatus, ExecutionSummary, StepContext};
pub use executor::{
    ChainExecutor, ChainExecutorConfig, ChainRef, ChainRunResult, ExecuteOptions, StepSelector,
};
pub use renderer::{RenderError, RenderedTemplate, TemplateRenderer, TemplateSource};
pub use repository::ChainSource;

#[cfg(test)]
pub use renderer::MockTemplateRenderer;
