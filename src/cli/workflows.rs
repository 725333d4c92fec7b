//! Workflow inspection commands

use clap::{Args, Subcommand};
use serde_json::json;

#[derive(Args, Clone)]
pub struct WorkflowsArgs {
    #[command(subcommand)]
    pub action: WorkflowAction,
}

#[derive(Subcommand, Clone)]
pub enum WorkflowAction {
    /// List workflow IDs
    List,

    /// Print a workflow document
    Show { workflow_id: String },

    /// Delete a workflow document
    Delete { workflow_id: String },
}

pub async fn run(args: WorkflowsArgs, config_dir: &str) -> anyhow::Result<()> {
    let (_, state) = super::bootstrap(config_dir).await?;
    let service = &state.execution_service;

    match args.action {
        WorkflowAction::List => super::print_json(&service.list_workflows().await?),
        WorkflowAction::Show { workflow_id } => {
            super::print_json(&service.get_workflow(&workflow_id).await?)
        }
        WorkflowAction::Delete { workflow_id } => {
            let deleted = service.delete_workflow(&workflow_id).await?;
            super::print_json(&json!({ "workflowId": workflow_id, "deleted": deleted }))
        }
    }
}
