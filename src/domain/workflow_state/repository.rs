//! Workflow-state store trait

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::entity::{CheckpointInfo, ExecutionRecord, WorkflowData, WorkflowDataId};
use crate::domain::DomainError;

/// Durable CRUD over workflow-state documents
///
/// Every mutation persists the whole document and refreshes `updatedAt`.
/// No mutual exclusion is provided: concurrent writers on the same ID race
/// and the last write wins, so callers must serialise runs per ID.
#[async_trait]
pub trait WorkflowStateStore: Send + Sync + std::fmt::Debug {
    /// Create and persist a new document seeded with `initial_data`
    async fn create(
        &self,
        workflow_name: &str,
        initial_data: Map<String, Value>,
    ) -> Result<WorkflowData, DomainError>;

    /// Load a document, `NotFound` if it does not exist
    async fn load(&self, id: &WorkflowDataId) -> Result<WorkflowData, DomainError>;

    /// Overwrite a document
    async fn save(&self, document: WorkflowData) -> Result<WorkflowData, DomainError>;

    /// Shallow-merge `partial` into the document's data
    async fn update_data(
        &self,
        id: &WorkflowDataId,
        partial: Map<String, Value>,
    ) -> Result<WorkflowData, DomainError>;

    /// Append an execution record
    async fn add_execution_record(
        &self,
        id: &WorkflowDataId,
        record: ExecutionRecord,
    ) -> Result<WorkflowData, DomainError>;

    /// Set or clear the pending checkpoint
    async fn set_checkpoint(
        &self,
        id: &WorkflowDataId,
        checkpoint: Option<CheckpointInfo>,
    ) -> Result<WorkflowData, DomainError>;

    /// Delete a document; deleting a missing ID is not an error
    async fn delete(&self, id: &WorkflowDataId) -> Result<bool, DomainError>;

    /// IDs of all stored documents, sorted
    async fn list(&self) -> Result<Vec<String>, DomainError>;
}
