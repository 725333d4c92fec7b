//! CLI module for the prompt chain engine
//!
//! Subcommands:
//! - `execute`: run a chain, optionally resuming or pausing
//! - `answer`: provide input for a workflow waiting at a checkpoint
//! - `analyze`: extract a template's unified schema
//! - `validate`: validate data against a schema or a template's inputs
//! - `workflows`: list, show or delete persisted workflows
//! - `chains`: list available chain definitions

pub mod analyze;
pub mod chains;
pub mod execute;
pub mod workflows;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::AppConfig;
use crate::infrastructure::logging;
use crate::AppState;

/// Prompt chain engine - run multi-step Handlebars prompt chains
#[derive(Parser)]
#[command(name = "prompt-chain")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding `default` and `local` configuration files
    #[arg(long, global = true, default_value = "config")]
    pub config_dir: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a chain
    Execute(execute::ExecuteArgs),

    /// Answer the checkpoint a workflow is waiting on
    Answer(execute::AnswerArgs),

    /// Extract the unified schema of a template
    Analyze(analyze::AnalyzeArgs),

    /// Validate a data document
    Validate(analyze::ValidateArgs),

    /// Inspect persisted workflows
    Workflows(workflows::WorkflowsArgs),

    /// List chain definitions
    Chains,
}

/// Load configuration, initialise logging and build the application state
pub async fn bootstrap(config_dir: &str) -> anyhow::Result<(AppConfig, AppState)> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load_from(config_dir).unwrap_or_default();
    logging::init_logging(&config.logging);

    let state = crate::create_app_state(&config).await?;
    Ok((config, state))
}

/// Print a value to stdout as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Read a JSON or YAML document from inline text or a file
pub fn read_document(inline: Option<&str>, file: Option<&Path>) -> anyhow::Result<Option<Value>> {
    let text = match (inline, file) {
        (Some(_), Some(_)) => bail!("Pass either inline data or a data file, not both"),
        (Some(text), None) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => return Ok(None),
    };

    let value: Value = serde_yaml::from_str(&text).context("Data is neither JSON nor YAML")?;
    Ok(Some(value))
}

/// Like [`read_document`], but the document must be an object
pub fn read_data(
    inline: Option<&str>,
    file: Option<&PathBuf>,
) -> anyhow::Result<Option<Map<String, Value>>> {
    match read_document(inline, file.map(PathBuf::as_path))? {
        None => Ok(None),
        Some(Value::Object(fields)) => Ok(Some(fields)),
        Some(other) => bail!(
            "Data must be an object, got {}",
            crate::domain::schema::json_type_name(&other)
        ),
    }
}
