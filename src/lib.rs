//! Prompt chain engine
//!
//! Runs multi-step prompt chains: each step renders a Handlebars template
//! against the fields accumulated so far and merges its outputs into a
//! persisted workflow-state document. Includes:
//! - Static extraction of a template's input/output contract
//! - Validation of data against declared field schemas
//! - Pause, resume and human-input checkpoints
//! - File-backed or in-memory workflow-state storage

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod state;

pub use config::AppConfig;
pub use state::AppState;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use domain::chain::{ChainExecutor, ChainExecutorConfig, ChainSource, TemplateSource};
use domain::workflow_state::WorkflowData;
use infrastructure::chain::FileChainSource;
use infrastructure::services::{AnalysisService, ExecutionService};
use infrastructure::storage::StorageFactory;
use infrastructure::template::{HandlebarsRenderer, HelperRegistry, PromptsDirectory};
use infrastructure::workflow_state::StorageWorkflowStateStore;

/// Create the application state with all services initialized
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let storage_config = config.storage.storage_config()?;

    info!(backend = ?storage_config.storage_type(), "Initializing workflow storage");

    let storage = StorageFactory::create::<WorkflowData>(&storage_config)
        .await
        .context("Failed to initialize workflow storage")?;
    let store = Arc::new(StorageWorkflowStateStore::new(storage));

    let helpers = Arc::new(HelperRegistry::with_defaults());
    let templates: Arc<dyn TemplateSource> = Arc::new(
        PromptsDirectory::new(&config.prompts.root).with_extension(&config.prompts.extension),
    );
    let chain_source: Arc<dyn ChainSource> = Arc::new(FileChainSource::new(&config.chains.root));

    let renderer = Arc::new(HandlebarsRenderer::new(templates.clone(), helpers.clone()));
    let executor = ChainExecutor::new(renderer, store, ChainExecutorConfig::from(&config.executor))
        .with_chain_source(chain_source.clone())
        .with_template_source(templates.clone())
        .with_helper_catalog(helpers.clone());

    Ok(AppState {
        execution_service: Arc::new(ExecutionService::new(Arc::new(executor))),
        analysis_service: Arc::new(AnalysisService::new(templates, helpers.clone())),
        chain_source,
        helpers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain::{ExecutionStatus, StepSelector};
    use crate::infrastructure::services::ExecuteRequest;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Demo project: a three-step blog chain with front matter and a mapper
    fn demo_project() -> (TempDir, AppConfig) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        write(
            root,
            "prompts/blog/outline.hbs",
            "---\noutputs:\n  - name: outline\n    type: string\n    required: true\n---\n{\"outline\": \"Intro to {{topic}}; Details; Wrap-up\"}\n",
        );
        write(
            root,
            "prompts/blog/draft.hbs",
            "{\"text\": \"{{outline}}{{#if tone}} ({{tone}}){{/if}}\"}",
        );
        write(root, "prompts/blog/title.hbs", "{{uppercase topic}}: a guide");
        write(
            root,
            "prompts/toc/index.hbs",
            "{{#each sections}}{{@key}}={{this}};{{/each}}",
        );
        write(root, "prompts/notes/stamp.hbs", "{{today}}: {{note}}");
        write(
            root,
            "chains/toc.yaml",
            "name: toc\nversion: \"1\"\nsteps:\n  - id: index\n    prompt: toc/index\n    inputs: [sections]\n    outputs: [listing]\n",
        );
        write(
            root,
            "chains/stamp.yaml",
            "name: stamp\nversion: \"1\"\nsteps:\n  - id: stamp\n    prompt: notes/stamp\n    inputs: [note]\n    outputs: [stamped]\n",
        );
        write(
            root,
            "chains/blog.yaml",
            r#"
name: blog
version: "1.0.0"
steps:
  - id: outline
    prompt: blog/outline
    inputs: [topic]
    outputs: [outline]
  - id: draft
    prompt: blog/draft
    inputs: [outline]
    outputs: [text]
    mapper:
      text: draft
  - id: title
    prompt: blog/title
    inputs: [topic, draft]
    outputs: [title]
"#,
        );

        let mut config = AppConfig::default();
        config.storage.workflow_dir = root.join("workflows");
        config.prompts.root = root.join("prompts");
        config.chains.root = root.join("chains");

        (dir, config)
    }

    fn topic() -> serde_json::Map<String, serde_json::Value> {
        json!({ "topic": "rust" }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_demo_chain_end_to_end() {
        let (dir, config) = demo_project();
        let state = create_app_state(&config).await.unwrap();

        let result = state
            .execution_service
            .execute(ExecuteRequest::new("blog".to_string()).with_initial_data(topic()))
            .await
            .unwrap();

        assert_eq!(result.summary.steps_executed, 3);
        assert_eq!(result.summary.status, ExecutionStatus::Completed);

        let data = &result.workflow_data.data;
        assert_eq!(data["outline"], json!("Intro to rust; Details; Wrap-up"));
        assert_eq!(data["draft"], json!("Intro to rust; Details; Wrap-up"));
        assert_eq!(data["title"], json!("RUST: a guide"));
        assert!(!data.contains_key("text"));

        let file = dir
            .path()
            .join("workflows")
            .join(format!("{}.json", result.workflow_data.id));
        let persisted: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file).unwrap()).unwrap();
        assert_eq!(persisted["executedTemplates"].as_array().unwrap().len(), 3);
        assert_eq!(persisted["executedTemplates"][1]["outputFields"], json!(["draft"]));
    }

    #[tokio::test]
    async fn test_demo_chain_pause_and_resume() {
        let (_dir, config) = demo_project();
        let state = create_app_state(&config).await.unwrap();
        let service = &state.execution_service;

        let paused = service
            .execute(
                ExecuteRequest::new("blog".to_string())
                    .with_initial_data(topic())
                    .with_pause_after(StepSelector::Id("outline".to_string())),
            )
            .await
            .unwrap();
        assert_eq!(paused.summary.status, ExecutionStatus::Paused);

        let resumed = service
            .execute(
                ExecuteRequest::new("blog".to_string())
                    .with_workflow_id(paused.workflow_data.id.to_string())
                    .with_resume(true),
            )
            .await
            .unwrap();

        assert_eq!(resumed.summary.steps_executed, 2);
        assert_eq!(resumed.workflow_data.data["title"], json!("RUST: a guide"));
    }

    #[tokio::test]
    async fn test_demo_chain_missing_topic_fails_validation() {
        let (_dir, config) = demo_project();
        let state = create_app_state(&config).await.unwrap();

        let err = state
            .execution_service
            .execute(ExecuteRequest::new("blog".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.error.kind, "missing_input");
        assert_eq!(err.error.step_id.as_deref(), Some("outline"));
    }

    #[tokio::test]
    async fn test_bundled_blog_chain_with_checkpoint() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let mut config = AppConfig::default();
        config.storage.backend = "in_memory".to_string();
        config.prompts.root = root.join("prompts");
        config.chains.root = root.join("chains");

        let state = create_app_state(&config).await.unwrap();
        let service = &state.execution_service;

        let waiting = service
            .execute(ExecuteRequest::new("blog").with_initial_data(topic()))
            .await
            .unwrap();
        assert_eq!(waiting.summary.status, ExecutionStatus::AwaitingInput);
        assert_eq!(waiting.summary.steps_executed, 1);

        let id = waiting.workflow_data.id.to_string();
        let pending = waiting.workflow_data.checkpoint.unwrap();
        assert_eq!(pending.output_field, "outlineApproved");

        let answered = service.provide_input(&id, json!(true)).await.unwrap();
        assert!(answered.checkpoint.is_none());

        let finished = service
            .execute(ExecuteRequest::new("blog").with_workflow_id(id).with_resume(true))
            .await
            .unwrap();

        assert_eq!(finished.summary.status, ExecutionStatus::Completed);
        assert_eq!(finished.summary.steps_executed, 2);
        let draft = finished.workflow_data.data["draft"].as_str().unwrap();
        assert!(draft.starts_with("RUST\n\n1. Why rust matters"));
        assert!(!draft.contains("without approval"));
    }

    #[tokio::test]
    async fn test_each_iterates_object_fields() {
        let (_dir, config) = demo_project();
        let state = create_app_state(&config).await.unwrap();

        let sections = json!({ "sections": { "a": 1, "b": 2 } }).as_object().cloned().unwrap();
        let result = state
            .execution_service
            .execute(ExecuteRequest::new("toc").with_initial_data(sections))
            .await
            .unwrap();

        assert_eq!(result.summary.status, ExecutionStatus::Completed);
        assert_eq!(result.workflow_data.data["listing"], json!("a=1;b=2;"));
    }

    fn today(_: &[serde_json::Value]) -> serde_json::Value {
        json!("2026-10-18")
    }

    #[tokio::test]
    async fn test_helper_registered_after_startup() {
        let (_dir, config) = demo_project();
        let state = create_app_state(&config).await.unwrap();
        state.helpers.register("today", today).unwrap();

        let note = json!({ "note": "standup" }).as_object().cloned().unwrap();
        let result = state
            .execution_service
            .execute(ExecuteRequest::new("stamp").with_initial_data(note))
            .await
            .unwrap();

        assert_eq!(result.summary.status, ExecutionStatus::Completed);
        assert_eq!(result.workflow_data.data["stamped"], json!("2026-10-18: standup"));
        assert!(!result.workflow_data.data.contains_key("today"));
    }

    #[tokio::test]
    async fn test_unknown_storage_backend() {
        let mut config = AppConfig::default();
        config.storage.backend = "tape".to_string();
        assert!(create_app_state(&config).await.is_err());
    }
}
