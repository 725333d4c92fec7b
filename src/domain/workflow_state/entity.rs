//! Workflow-state document and related types

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::storage::{StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Maximum length for workflow-state IDs
pub const MAX_ID_LENGTH: usize = 64;

/// Alphanumeric and hyphens, so an ID is always a safe file name
static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]$|^[a-zA-Z0-9]$").unwrap());

/// Validated workflow-state document identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkflowDataId(String);

impl WorkflowDataId {
    /// Create a new validated ID
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        validate_workflow_data_id(&id)?;
        Ok(Self(id))
    }

    /// Generate a fresh ID: `wf-YYYYMMDDHHMMSS-xxxxxxxx`
    pub fn generate() -> Self {
        let suffix: u32 = rand::random();
        Self(format!(
            "wf-{}-{:08x}",
            Utc::now().format("%Y%m%d%H%M%S"),
            suffix
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WorkflowDataId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkflowDataId> for String {
    fn from(id: WorkflowDataId) -> Self {
        id.0
    }
}

impl fmt::Display for WorkflowDataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for WorkflowDataId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validate a workflow-state ID string
pub fn validate_workflow_data_id(id: &str) -> Result<(), DomainError> {
    if id.is_empty() {
        return Err(DomainError::invalid_id("Workflow ID cannot be empty"));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(DomainError::invalid_id(format!(
            "Workflow ID exceeds maximum length of {} characters",
            MAX_ID_LENGTH
        )));
    }

    if !ID_PATTERN.is_match(id) {
        return Err(DomainError::invalid_id(format!(
            "Invalid workflow ID '{}': must be alphanumeric with hyphens, start and end with alphanumeric",
            id
        )));
    }

    Ok(())
}

/// Kind of answer a checkpoint expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointInputType {
    /// One of a fixed list of options
    Selection,
    /// Any text
    Freeform,
    /// A yes/no decision
    Approval,
}

impl CheckpointInputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::Freeform => "freeform",
            Self::Approval => "approval",
        }
    }
}

impl fmt::Display for CheckpointInputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending request for human input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointInfo {
    pub template_path: String,
    pub input_type: CheckpointInputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub output_field: String,
}

impl CheckpointInfo {
    /// Check an answer against this checkpoint's input type
    pub fn accepts(&self, value: &Value) -> Result<(), DomainError> {
        match self.input_type {
            CheckpointInputType::Approval => {
                if !value.is_boolean() {
                    return Err(DomainError::validation(format!(
                        "Checkpoint '{}' expects a boolean approval",
                        self.output_field
                    )));
                }
            }
            CheckpointInputType::Selection => {
                let options = self.options.as_deref().unwrap_or_default();
                let selected = value.as_str().unwrap_or_default();
                if !options.iter().any(|o| o == selected) {
                    return Err(DomainError::validation(format!(
                        "Checkpoint '{}' expects one of: {}",
                        self.output_field,
                        options.join(", ")
                    )));
                }
            }
            CheckpointInputType::Freeform => {
                if !value.is_string() {
                    return Err(DomainError::validation(format!(
                        "Checkpoint '{}' expects a text answer",
                        self.output_field
                    )));
                }
            }
        }

        Ok(())
    }
}

/// One successfully executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub step_id: String,
    pub template_path: String,
    pub executed_at: DateTime<Utc>,
    /// Canonical (post-mapper) names of the fields the step wrote
    pub output_fields: Vec<String>,
    pub render_time_ms: u64,
}

/// The persisted state of one chain run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowData {
    pub id: WorkflowDataId,
    pub workflow_name: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub executed_templates: Vec<ExecutionRecord>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub checkpoint: Option<CheckpointInfo>,
}

impl WorkflowData {
    /// Start a new document with a generated ID
    pub fn new(workflow_name: impl Into<String>, initial_data: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowDataId::generate(),
            workflow_name: workflow_name.into(),
            started_at: now,
            updated_at: now,
            executed_templates: Vec::new(),
            data: initial_data,
            checkpoint: None,
        }
    }

    /// Shallow merge, incoming values overwrite existing keys
    pub fn merge_data(&mut self, partial: Map<String, Value>) {
        for (key, value) in partial {
            self.data.insert(key, value);
        }
    }

    pub fn record_execution(&mut self, record: ExecutionRecord) {
        self.executed_templates.push(record);
    }

    /// Number of steps completed so far
    pub fn steps_completed(&self) -> usize {
        self.executed_templates.len()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    /// Refresh `updated_at`, never moving it backwards
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }
}

impl StorageEntity for WorkflowData {
    type Key = WorkflowDataId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_generated_id_format() {
        let id = WorkflowDataId::generate();
        let pattern = Regex::new(r"^wf-\d{14}-[0-9a-f]{8}$").unwrap();
        assert!(pattern.is_match(id.as_str()), "unexpected id {}", id);
        assert!(WorkflowDataId::new(id.as_str()).is_ok());
    }

    #[test]
    fn test_invalid_ids() {
        assert!(WorkflowDataId::new("").is_err());
        assert!(WorkflowDataId::new("../etc/passwd").is_err());
        assert!(WorkflowDataId::new("-leading").is_err());
        assert!(WorkflowDataId::new("a".repeat(65)).is_err());
        assert!(WorkflowDataId::new("wf-1").is_ok());
    }

    #[test]
    fn test_merge_is_last_write_wins() {
        let mut doc = WorkflowData::new("demo", map(json!({"topic": "rust", "tone": "dry"})));
        doc.merge_data(map(json!({"tone": "playful", "draft": "..."})));

        assert_eq!(doc.data["topic"], json!("rust"));
        assert_eq!(doc.data["tone"], json!("playful"));
        assert_eq!(doc.data["draft"], json!("..."));
    }

    #[test]
    fn test_serialized_shape() {
        let mut doc = WorkflowData::new("demo", Map::new());
        doc.record_execution(ExecutionRecord {
            step_id: "outline".to_string(),
            template_path: "outline.hbs".to_string(),
            executed_at: Utc::now(),
            output_fields: vec!["outline".to_string()],
            render_time_ms: 3,
        });

        let value = serde_json::to_value(&doc).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        for key in [
            "id",
            "workflowName",
            "startedAt",
            "updatedAt",
            "executedTemplates",
            "data",
            "checkpoint",
        ] {
            assert!(keys.contains(&key), "missing key {}", key);
        }
        assert!(value["checkpoint"].is_null());
        assert_eq!(value["executedTemplates"][0]["stepId"], json!("outline"));
        assert_eq!(value["executedTemplates"][0]["renderTimeMs"], json!(3));

        let back: WorkflowData = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_checkpoint_accepts() {
        let selection = CheckpointInfo {
            template_path: "pick.hbs".to_string(),
            input_type: CheckpointInputType::Selection,
            options: Some(vec!["a".to_string(), "b".to_string()]),
            output_field: "choice".to_string(),
        };
        assert!(selection.accepts(&json!("a")).is_ok());
        assert!(selection.accepts(&json!("c")).is_err());

        let approval = CheckpointInfo {
            input_type: CheckpointInputType::Approval,
            options: None,
            ..selection.clone()
        };
        assert!(approval.accepts(&json!(false)).is_ok());
        assert!(approval.accepts(&json!("yes")).is_err());

        let freeform = CheckpointInfo {
            input_type: CheckpointInputType::Freeform,
            options: None,
            ..selection
        };
        assert!(freeform.accepts(&json!("anything")).is_ok());
        assert!(freeform.accepts(&json!(3)).is_err());
    }

    #[test]
    fn test_touch_never_goes_backwards() {
        let mut doc = WorkflowData::new("demo", Map::new());
        let before = doc.updated_at;
        doc.touch();
        assert!(doc.updated_at >= before);
    }
}
