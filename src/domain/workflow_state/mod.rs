//! Workflow-state domain - the persisted document a chain run accumulates into

mod entity;
mod repository;

pub use entity::{
    validate_workflow_data_id, CheckpointInfo, CheckpointInputType, ExecutionRecord, WorkflowData,
    WorkflowDataId, MAX_ID_LENGTH,
};
pub use repository::WorkflowStateStore;
