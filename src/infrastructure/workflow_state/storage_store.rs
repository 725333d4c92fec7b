//! Storage-backed workflow-state store

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::storage::Storage;
use crate::domain::workflow_state::{
    CheckpointInfo, ExecutionRecord, WorkflowData, WorkflowDataId, WorkflowStateStore,
};
use crate::domain::DomainError;

/// Workflow-state store over any `Storage<WorkflowData>` backend
#[derive(Debug)]
pub struct StorageWorkflowStateStore {
    storage: Arc<dyn Storage<WorkflowData>>,
}

impl StorageWorkflowStateStore {
    pub fn new(storage: Arc<dyn Storage<WorkflowData>>) -> Self {
        Self { storage }
    }

    async fn persist(&self, mut document: WorkflowData) -> Result<WorkflowData, DomainError> {
        document.touch();
        self.storage.save(document).await
    }

    async fn modify<F>(&self, id: &WorkflowDataId, change: F) -> Result<WorkflowData, DomainError>
    where
        F: FnOnce(&mut WorkflowData) + Send,
    {
        let mut document = self.load(id).await?;
        change(&mut document);
        self.persist(document).await
    }
}

#[async_trait]
impl WorkflowStateStore for StorageWorkflowStateStore {
    async fn create(
        &self,
        workflow_name: &str,
        initial_data: Map<String, Value>,
    ) -> Result<WorkflowData, DomainError> {
        let mut document = WorkflowData::new(workflow_name, initial_data);

        while self.storage.exists(&document.id).await? {
            document.id = WorkflowDataId::generate();
        }

        debug!(workflow_id = %document.id, workflow = workflow_name, "Creating workflow state");
        self.storage.save(document).await
    }

    async fn load(&self, id: &WorkflowDataId) -> Result<WorkflowData, DomainError> {
        self.storage
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Workflow '{}' not found", id)))
    }

    async fn save(&self, document: WorkflowData) -> Result<WorkflowData, DomainError> {
        self.persist(document).await
    }

    async fn update_data(
        &self,
        id: &WorkflowDataId,
        partial: Map<String, Value>,
    ) -> Result<WorkflowData, DomainError> {
        self.modify(id, |doc| doc.merge_data(partial)).await
    }

    async fn add_execution_record(
        &self,
        id: &WorkflowDataId,
        record: ExecutionRecord,
    ) -> Result<WorkflowData, DomainError> {
        self.modify(id, |doc| doc.record_execution(record)).await
    }

    async fn set_checkpoint(
        &self,
        id: &WorkflowDataId,
        checkpoint: Option<CheckpointInfo>,
    ) -> Result<WorkflowData, DomainError> {
        self.modify(id, |doc| doc.checkpoint = checkpoint).await
    }

    async fn delete(&self, id: &WorkflowDataId) -> Result<bool, DomainError> {
        self.storage.delete(id).await
    }

    async fn list(&self) -> Result<Vec<String>, DomainError> {
        self.storage.keys().await
    }
}
