//! Execute and answer commands

use std::path::PathBuf;

use clap::Args;
use serde_json::Value;
use tracing::info;

use crate::domain::chain::StepSelector;
use crate::infrastructure::chain::parse_chain;
use crate::infrastructure::services::{ErrorPayload, ExecuteRequest};

/// Arguments for the execute command
#[derive(Args, Clone)]
pub struct ExecuteArgs {
    /// Chain name under the chains directory, or a path with `--file`
    pub chain: String,

    /// Treat CHAIN as a path to a chain definition file
    #[arg(long)]
    pub file: bool,

    /// Initial data as inline JSON or YAML
    #[arg(long)]
    pub data: Option<String>,

    /// Initial data read from a JSON or YAML file
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// Existing workflow ID to continue
    #[arg(long)]
    pub workflow_id: Option<String>,

    /// Skip steps already recorded in the workflow
    #[arg(long, requires = "workflow_id")]
    pub resume: bool,

    /// Stop after this step (0-based index or step ID)
    #[arg(long)]
    pub pause_after: Option<String>,
}

/// Arguments for the answer command
#[derive(Args, Clone)]
pub struct AnswerArgs {
    /// Workflow waiting at a checkpoint
    pub workflow_id: String,

    /// Answer as JSON; anything that is not valid JSON is taken as a string
    pub value: String,
}

/// Run a chain and print the resulting workflow document
pub async fn run(args: ExecuteArgs, config_dir: &str) -> anyhow::Result<()> {
    let (_, state) = super::bootstrap(config_dir).await?;

    let mut request = if args.file {
        let path = PathBuf::from(&args.chain);
        let content = tokio::fs::read_to_string(&path).await?;
        ExecuteRequest::new(parse_chain(&path, &content)?)
    } else {
        ExecuteRequest::new(args.chain.as_str())
    };

    if let Some(data) = super::read_data(args.data.as_deref(), args.data_file.as_ref())? {
        request = request.with_initial_data(data);
    }
    if let Some(id) = args.workflow_id {
        request = request.with_workflow_id(id);
    }
    if let Some(step) = args.pause_after.as_deref() {
        request = request.with_pause_after(parse_step_selector(step));
    }
    request = request.with_resume(args.resume);

    match state.execution_service.execute(request).await {
        Ok(result) => {
            info!(
                workflow_id = %result.workflow_data.id,
                steps = result.summary.steps_executed,
                status = ?result.summary.status,
                "Chain run finished"
            );
            super::print_json(&result)
        }
        Err(payload) => fail(payload),
    }
}

/// Provide checkpoint input and print the updated workflow document
pub async fn answer(args: AnswerArgs, config_dir: &str) -> anyhow::Result<()> {
    let (_, state) = super::bootstrap(config_dir).await?;

    let value = parse_answer(&args.value);
    match state
        .execution_service
        .provide_input(&args.workflow_id, value)
        .await
    {
        Ok(document) => super::print_json(&document),
        Err(payload) => fail(payload),
    }
}

fn fail(payload: ErrorPayload) -> anyhow::Result<()> {
    super::print_json(&payload)?;
    anyhow::bail!("{}: {}", payload.error.kind, payload.error.message)
}

/// Numbers select a step by index, anything else by ID
pub fn parse_step_selector(step: &str) -> StepSelector {
    match step.parse::<usize>() {
        Ok(index) => StepSelector::Index(index),
        Err(_) => StepSelector::Id(step.to_string()),
    }
}

pub fn parse_answer(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
