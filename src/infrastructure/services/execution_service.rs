//! Execution service - entry points for running chains and answering checkpoints

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::chain::{
    ChainError, ChainExecutor, ChainRef, ChainRunResult, ExecuteOptions, ExecutionSummary,
    StepSelector,
};
use crate::domain::schema::ValidationError;
use crate::domain::workflow_state::{WorkflowData, WorkflowDataId};
use crate::domain::DomainError;

/// Request to run a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub chain: ChainRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub resume: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_after_step: Option<StepSelector>,
}

impl ExecuteRequest {
    pub fn new(chain: impl Into<ChainRef>) -> Self {
        Self {
            chain: chain.into(),
            initial_data: None,
            workflow_id: None,
            resume: false,
            pause_after_step: None,
        }
    }

    pub fn with_initial_data(mut self, data: Map<String, Value>) -> Self {
        self.initial_data = Some(data);
        self
    }

    pub fn with_workflow_id(mut self, id: impl Into<String>) -> Self {
        self.workflow_id = Some(id.into());
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_pause_after(mut self, step: StepSelector) -> Self {
        self.pause_after_step = Some(step);
        self
    }
}

/// Serialisable description of a failed request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error: ErrorBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_summary: Option<ExecutionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<ValidationError>,
}

impl From<&ChainError> for ErrorPayload {
    fn from(err: &ChainError) -> Self {
        let validation_errors = match err {
            ChainError::SchemaValidation { errors, .. } => errors.clone(),
            _ => Vec::new(),
        };

        Self {
            error: ErrorBody {
                kind: err.kind().as_str().to_string(),
                message: err.to_string(),
                step_index: err.step_index(),
                step_id: err.step_id().map(str::to_string),
                template_path: err.template_path().map(str::to_string),
                workflow_id: err.workflow_id().map(str::to_string),
                retryable: err.is_retryable(),
                validation_errors,
            },
            execution_summary: err.summary().cloned(),
        }
    }
}

impl From<ChainError> for ErrorPayload {
    fn from(err: ChainError) -> Self {
        Self::from(&err)
    }
}

/// Chain execution entry points
#[derive(Debug)]
pub struct ExecutionService {
    executor: Arc<ChainExecutor>,
}

impl ExecutionService {
    pub fn new(executor: Arc<ChainExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<ChainExecutor> {
        &self.executor
    }

    /// Run a chain as described by the request
    pub async fn execute(&self, request: ExecuteRequest) -> Result<ChainRunResult, ErrorPayload> {
        let mut options = ExecuteOptions::new();
        options.resume = request.resume;
        options.pause_after_step = request.pause_after_step;
        options.initial_data = request.initial_data;
        options.workflow_id = request
            .workflow_id
            .map(WorkflowDataId::new)
            .transpose()
            .map_err(ChainError::from)?;

        Ok(self.executor.execute(request.chain, options).await?)
    }

    /// Answer the pending checkpoint of a workflow
    pub async fn provide_input(
        &self,
        workflow_id: &str,
        value: Value,
    ) -> Result<WorkflowData, ErrorPayload> {
        let id = WorkflowDataId::new(workflow_id).map_err(ChainError::from)?;
        Ok(self.executor.provide_input(&id, value).await?)
    }

    pub async fn get_workflow(&self, workflow_id: &str) -> Result<WorkflowData, DomainError> {
        let id = WorkflowDataId::new(workflow_id)?;
        self.executor.store().load(&id).await
    }

    pub async fn list_workflows(&self) -> Result<Vec<String>, DomainError> {
        self.executor.store().list().await
    }

    pub async fn delete_workflow(&self, workflow_id: &str) -> Result<bool, DomainError> {
        let id = WorkflowDataId::new(workflow_id)?;
        self.executor.store().delete(&id).await
    }
}
