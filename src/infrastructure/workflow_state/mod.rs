//! Workflow-state store implementations

mod storage_store;

pub use storage_store::StorageWorkflowStateStore;
