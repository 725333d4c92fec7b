//! Domain layer - Core entities, execution logic and storage abstractions

pub mod chain;
pub mod error;
pub mod schema;
pub mod storage;
pub mod workflow_state;

pub use chain::{
    ChainDefinition, ChainError, ChainExecutor, ChainExecutorConfig, ChainRef, ChainSource,
    ChainStep, ExecutionStatus, ExecutionSummary, TemplateRenderer, TemplateSource,
};
pub use error::DomainError;
pub use schema::{FieldType, SchemaField, UnifiedSchema, ValidationError, ValidationResult};
pub use storage::{Storage, StorageEntity, StorageKey};
pub use workflow_state::{WorkflowData, WorkflowDataId, WorkflowStateStore};
