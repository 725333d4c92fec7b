//! Analyze and validate commands

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::infrastructure::services::{SchemaInput, TemplateInput};

/// Arguments for the analyze command
#[derive(Args, Clone)]
pub struct AnalyzeArgs {
    /// Template reference under the prompts directory
    #[arg(required_unless_present = "source")]
    pub template: Option<String>,

    /// Analyse a template file outside the prompts directory
    #[arg(long, conflicts_with = "template")]
    pub source: Option<PathBuf>,
}

/// Arguments for the validate command
#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Schema document (field list or name-keyed object) as JSON or YAML
    #[arg(long, required_unless_present = "template")]
    pub schema: Option<PathBuf>,

    /// Validate against the inputs of this template instead
    #[arg(long, conflicts_with = "schema")]
    pub template: Option<String>,

    /// Data as inline JSON or YAML
    #[arg(long)]
    pub data: Option<String>,

    /// Data read from a JSON or YAML file
    #[arg(long)]
    pub data_file: Option<PathBuf>,
}

pub async fn run(args: AnalyzeArgs, config_dir: &str) -> anyhow::Result<()> {
    let (_, state) = super::bootstrap(config_dir).await?;

    let input = match (args.template, args.source) {
        (_, Some(path)) => TemplateInput::Source {
            source: tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
            label: Some(path.display().to_string()),
        },
        (Some(template), None) => TemplateInput::Reference { template },
        (None, None) => anyhow::bail!("A template reference or --source is required"),
    };

    let report = state.analysis_service.analyze(&input).await?;
    super::print_json(&report)
}

/// Validate data and fail when any violation is found
pub async fn validate(args: ValidateArgs, config_dir: &str) -> anyhow::Result<()> {
    let (_, state) = super::bootstrap(config_dir).await?;

    let schema = match (args.template, args.schema) {
        (Some(template), _) => SchemaInput::Template { template },
        (None, Some(path)) => SchemaInput::Inline(
            super::read_document(None, Some(path.as_path()))?.unwrap_or_default(),
        ),
        (None, None) => anyhow::bail!("Either --schema or --template is required"),
    };
    let data = super::read_data(args.data.as_deref(), args.data_file.as_ref())?
        .unwrap_or_default();

    let report = state.analysis_service.validate(&schema, &data).await?;
    super::print_json(&report)?;

    if !report.valid {
        anyhow::bail!("{} validation error(s)", report.errors.len());
    }
    Ok(())
}
