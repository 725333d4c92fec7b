//! Chain executor - walks a chain's steps against a persisted workflow-state document

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::entity::{ChainDefinition, ChainStep};
use super::error::{ChainError, ExecutionStatus, ExecutionSummary, StepContext};
use super::renderer::{RenderError, RenderedTemplate, TemplateRenderer, TemplateSource};
use super::repository::ChainSource;
use crate::domain::schema::{
    json_type_name, validate, HelperCatalog, SchemaExtractor, UnifiedSchema,
};
use crate::domain::workflow_state::{
    ExecutionRecord, WorkflowData, WorkflowDataId, WorkflowStateStore,
};

/// Configuration for the chain executor
#[derive(Debug, Clone)]
pub struct ChainExecutorConfig {
    /// Extract every step template's schema before running
    pub preflight: bool,
    /// Validate data against extracted schemas before and after each render
    pub validate_schemas: bool,
    /// Upper bound for a single render
    pub render_timeout_ms: Option<u64>,
}

impl Default for ChainExecutorConfig {
    fn default() -> Self {
        Self {
            preflight: true,
            validate_schemas: true,
            render_timeout_ms: None,
        }
    }
}

/// A chain given inline or by reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainRef {
    Reference(String),
    Inline(ChainDefinition),
}

impl From<String> for ChainRef {
    fn from(reference: String) -> Self {
        Self::Reference(reference)
    }
}

impl From<&str> for ChainRef {
    fn from(reference: &str) -> Self {
        Self::Reference(reference.to_string())
    }
}

impl From<ChainDefinition> for ChainRef {
    fn from(chain: ChainDefinition) -> Self {
        Self::Inline(chain)
    }
}

/// Identifies a step by 0-based index or by ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepSelector {
    Index(usize),
    Id(String),
}

impl StepSelector {
    fn matches(&self, index: usize, step: &ChainStep) -> bool {
        match self {
            Self::Index(i) => *i == index,
            Self::Id(id) => *id == step.id,
        }
    }

    fn resolve(&self, chain: &ChainDefinition) -> Option<usize> {
        match self {
            Self::Index(i) if *i < chain.steps.len() => Some(*i),
            Self::Index(_) => None,
            Self::Id(id) => chain.step_index(id),
        }
    }
}

/// Options for a single `execute` call
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub initial_data: Option<Map<String, Value>>,
    pub workflow_id: Option<WorkflowDataId>,
    pub resume: bool,
    pub pause_after_step: Option<StepSelector>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_data(mut self, data: Map<String, Value>) -> Self {
        self.initial_data = Some(data);
        self
    }

    pub fn with_workflow_id(mut self, id: WorkflowDataId) -> Self {
        self.workflow_id = Some(id);
        self
    }

    /// Continue an existing document from its next unexecuted step
    pub fn resume(mut self, id: WorkflowDataId) -> Self {
        self.workflow_id = Some(id);
        self.resume = true;
        self
    }

    pub fn pause_after(mut self, step: StepSelector) -> Self {
        self.pause_after_step = Some(step);
        self
    }
}

/// Result of a chain run that did not fail
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRunResult {
    pub workflow_data: WorkflowData,
    #[serde(rename = "executionSummary")]
    pub summary: ExecutionSummary,
}

enum StepOutcome {
    Executed { render_time_ms: u64 },
    AwaitingInput,
}

/// Chain executor - executes prompt chains step by step, persisting after each step
pub struct ChainExecutor {
    renderer: Arc<dyn TemplateRenderer>,
    store: Arc<dyn WorkflowStateStore>,
    chains: Option<Arc<dyn ChainSource>>,
    templates: Option<Arc<dyn TemplateSource>>,
    helpers: Option<Arc<dyn HelperCatalog>>,
    config: ChainExecutorConfig,
}

impl std::fmt::Debug for ChainExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainExecutor")
            .field("store", &self.store)
            .field("chains", &self.chains)
            .field("templates", &self.templates)
            .field("helpers", &self.helpers)
            .field("config", &self.config)
            .finish()
    }
}

impl ChainExecutor {
    pub fn new(
        renderer: Arc<dyn TemplateRenderer>,
        store: Arc<dyn WorkflowStateStore>,
        config: ChainExecutorConfig,
    ) -> Self {
        Self {
            renderer,
            store,
            chains: None,
            templates: None,
            helpers: None,
            config,
        }
    }

    pub fn with_chain_source(mut self, chains: Arc<dyn ChainSource>) -> Self {
        self.chains = Some(chains);
        self
    }

    /// Enable preflight schema extraction against template sources
    pub fn with_template_source(mut self, templates: Arc<dyn TemplateSource>) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Helpers registered with the renderer, so bare `{{helper}}` calls are not taken for inputs
    pub fn with_helper_catalog(mut self, helpers: Arc<dyn HelperCatalog>) -> Self {
        self.helpers = Some(helpers);
        self
    }

    fn extractor(&self) -> SchemaExtractor {
        match &self.helpers {
            Some(helpers) => SchemaExtractor::from_catalog(helpers.as_ref()),
            None => SchemaExtractor::new(),
        }
    }

    pub fn config(&self) -> &ChainExecutorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStateStore> {
        &self.store
    }

    /// Run a chain, creating or continuing a workflow-state document
    pub async fn execute(
        &self,
        chain: ChainRef,
        options: ExecuteOptions,
    ) -> Result<ChainRunResult, ChainError> {
        let chain = self.resolve_chain(chain).await?;
        chain.validate().map_err(ChainError::validation)?;

        if let Some(selector) = &options.pause_after_step {
            if selector.resolve(&chain).is_none() {
                return Err(ChainError::validation(vec![format!(
                    "Pause step {:?} does not exist in chain '{}'",
                    selector, chain.name
                )]));
            }
        }

        let schemas = self.preflight(&chain).await?;
        let mut document = self.open_document(&chain, &options).await?;

        let start = if options.workflow_id.is_some() && options.resume {
            document.steps_completed()
        } else {
            0
        };

        info!(
            workflow_id = %document.id,
            chain = %chain.name,
            start_index = start,
            total_steps = chain.steps.len(),
            "Starting chain run"
        );

        let mut summary = ExecutionSummary::default();

        for (index, step) in chain.steps.iter().enumerate().skip(start) {
            let schema = schemas.get(index).and_then(Option::as_ref);

            match self
                .run_step(&mut document, index, step, schema, &summary)
                .await
            {
                Ok(StepOutcome::Executed { render_time_ms }) => {
                    summary.steps_executed += 1;
                    summary.total_render_time_ms += render_time_ms;
                }
                Ok(StepOutcome::AwaitingInput) => {
                    summary.status = ExecutionStatus::AwaitingInput;
                    break;
                }
                Err(err) => {
                    error!(
                        workflow_id = %document.id,
                        step_index = index,
                        step_id = %step.id,
                        template = %step.prompt,
                        kind = err.kind().as_str(),
                        error = %err,
                        "Chain step failed"
                    );
                    return Err(err);
                }
            }

            if options
                .pause_after_step
                .as_ref()
                .is_some_and(|p| p.matches(index, step))
            {
                summary.status = ExecutionStatus::Paused;
                break;
            }
        }

        info!(
            workflow_id = %document.id,
            chain = %chain.name,
            steps_executed = summary.steps_executed,
            total_render_time_ms = summary.total_render_time_ms,
            status = ?summary.status,
            "Chain run finished"
        );

        Ok(ChainRunResult {
            workflow_data: document,
            summary,
        })
    }

    /// Answer a pending checkpoint and clear it
    pub async fn provide_input(
        &self,
        id: &WorkflowDataId,
        value: Value,
    ) -> Result<WorkflowData, ChainError> {
        let mut document = self.store.load(id).await?;

        let Some(checkpoint) = document.checkpoint.take() else {
            return Err(ChainError::validation(vec![format!(
                "Workflow '{}' has no pending checkpoint",
                id
            )]));
        };

        checkpoint.accepts(&value)?;

        info!(
            workflow_id = %id,
            field = %checkpoint.output_field,
            "Checkpoint answered"
        );

        document.data.insert(checkpoint.output_field, value);
        self.store
            .save(document)
            .await
            .map_err(|e| ChainError::store(e, None))
    }

    async fn resolve_chain(&self, chain: ChainRef) -> Result<ChainDefinition, ChainError> {
        match chain {
            ChainRef::Inline(definition) => Ok(definition),
            ChainRef::Reference(reference) => {
                let Some(source) = &self.chains else {
                    return Err(ChainError::validation(vec![format!(
                        "Chain reference '{}' given but no chain source is configured",
                        reference
                    )]));
                };
                Ok(source.load(&reference).await?)
            }
        }
    }

    /// Extract each step template's schema; empty when preflight is off
    async fn preflight(
        &self,
        chain: &ChainDefinition,
    ) -> Result<Vec<Option<UnifiedSchema>>, ChainError> {
        let Some(templates) = self.templates.as_ref().filter(|_| self.config.preflight) else {
            return Ok(Vec::new());
        };

        let extractor = self.extractor();
        let mut schemas = Vec::with_capacity(chain.steps.len());
        let mut problems = Vec::new();

        for step in &chain.steps {
            let source = match templates.load(&step.prompt).await {
                Ok(source) => source,
                Err(e) => {
                    problems.push(format!("Step '{}': {}", step.id, e));
                    schemas.push(None);
                    continue;
                }
            };

            match extractor.extract(&source, &step.prompt) {
                Ok(extraction) => schemas.push(Some(extraction.schema)),
                Err(e) => {
                    problems.push(format!("Step '{}': {}", step.id, e));
                    schemas.push(None);
                }
            }
        }

        if !problems.is_empty() {
            return Err(ChainError::validation(problems));
        }

        debug!(chain = %chain.name, templates = schemas.len(), "Preflight extraction passed");
        Ok(schemas)
    }

    async fn open_document(
        &self,
        chain: &ChainDefinition,
        options: &ExecuteOptions,
    ) -> Result<WorkflowData, ChainError> {
        let Some(id) = &options.workflow_id else {
            return self
                .store
                .create(&chain.name, options.initial_data.clone().unwrap_or_default())
                .await
                .map_err(|e| ChainError::store(e, None));
        };

        let mut document = self.store.load(id).await?;

        match options.initial_data.clone() {
            Some(initial) if !initial.is_empty() => {
                document.merge_data(initial);
                self.store
                    .save(document)
                    .await
                    .map_err(|e| ChainError::store(e, None))
            }
            _ => Ok(document),
        }
    }

    async fn run_step(
        &self,
        document: &mut WorkflowData,
        index: usize,
        step: &ChainStep,
        schema: Option<&UnifiedSchema>,
        summary: &ExecutionSummary,
    ) -> Result<StepOutcome, ChainError> {
        let context = |document: &WorkflowData| step_context(document, index, step, summary);

        if let Some(checkpoint) = step.checkpoint_info() {
            if !document.has_field(&checkpoint.output_field) {
                warn!(
                    workflow_id = %document.id,
                    step_index = index,
                    step_id = %step.id,
                    field = %checkpoint.output_field,
                    "Step awaiting input"
                );

                document.checkpoint = Some(checkpoint);
                *document = self
                    .store
                    .save(document.clone())
                    .await
                    .map_err(|e| ChainError::store(e, Some(context(document))))?;

                return Ok(StepOutcome::AwaitingInput);
            }
        }
        document.checkpoint = None;

        if let Some(missing) = step.inputs.iter().find(|name| !document.has_field(name)) {
            return Err(ChainError::missing_input(missing, context(document)));
        }

        if let Some(schema) = schema.filter(|_| self.config.validate_schemas) {
            let result = validate(&document.data, &schema.inputs);
            if !result.valid {
                return Err(ChainError::schema_validation(result.errors, context(document)));
            }
        }

        debug!(
            workflow_id = %document.id,
            step_index = index,
            step_id = %step.id,
            template = %step.prompt,
            "Rendering step"
        );

        let started = Instant::now();
        let rendered = self
            .render(&step.prompt, &document.data)
            .await
            .map_err(|e| ChainError::render(e, context(document)))?;
        let render_time_ms = started.elapsed().as_millis() as u64;

        let raw = collect_outputs(step, rendered.output)
            .map_err(|e| ChainError::render(e, context(document)))?;

        if let Some(schema) = schema.filter(|s| self.config.validate_schemas && !s.outputs.is_empty()) {
            let produced: Map<String, Value> = raw.iter().cloned().collect();
            let result = validate(&produced, &schema.outputs);
            if !result.valid {
                return Err(ChainError::schema_validation(result.errors, context(document)));
            }
        }

        let mapped: Vec<(String, Value)> = raw
            .into_iter()
            .map(|(name, value)| (step.canonical_name(&name).to_string(), value))
            .collect();
        let output_fields = mapped.iter().map(|(name, _)| name.clone()).collect();

        document.merge_data(mapped.into_iter().collect());
        document.record_execution(ExecutionRecord {
            step_id: step.id.clone(),
            template_path: step.prompt.clone(),
            executed_at: Utc::now(),
            output_fields,
            render_time_ms,
        });

        *document = self
            .store
            .save(document.clone())
            .await
            .map_err(|e| ChainError::store(e, Some(context(document))))?;

        debug!(
            workflow_id = %document.id,
            step_index = index,
            step_id = %step.id,
            render_time_ms,
            "Step completed"
        );

        Ok(StepOutcome::Executed { render_time_ms })
    }

    async fn render(
        &self,
        template_path: &str,
        data: &Map<String, Value>,
    ) -> Result<RenderedTemplate, RenderError> {
        match self.config.render_timeout_ms {
            Some(ms) => timeout(
                Duration::from_millis(ms),
                self.renderer.render(template_path, data),
            )
            .await
            .map_err(|_| RenderError::timeout(template_path, ms))?,
            None => self.renderer.render(template_path, data).await,
        }
    }
}

fn step_context(
    document: &WorkflowData,
    index: usize,
    step: &ChainStep,
    summary: &ExecutionSummary,
) -> StepContext {
    StepContext {
        step_index: index,
        step_id: step.id.clone(),
        template_path: step.prompt.clone(),
        workflow_id: document.id.to_string(),
        summary: ExecutionSummary {
            failed_steps: 1,
            ..summary.clone()
        },
    }
}

/// Turn a rendered value into named raw output fields
fn collect_outputs(step: &ChainStep, output: Value) -> Result<Vec<(String, Value)>, RenderError> {
    match output {
        Value::Object(mut fields) if !step.outputs.is_empty() => step
            .outputs
            .iter()
            .map(|name| {
                fields.remove(name).map(|v| (name.clone(), v)).ok_or_else(|| {
                    RenderError::runtime(
                        &step.prompt,
                        format!("Rendered output is missing declared field '{}'", name),
                    )
                })
            })
            .collect(),
        Value::Object(fields) => Ok(fields.into_iter().collect()),
        Value::String(text) if step.outputs.len() == 1 => {
            Ok(vec![(step.outputs[0].clone(), Value::String(text))])
        }
        Value::String(_) => Err(RenderError::runtime(
            &step.prompt,
            format!(
                "Rendered text can only fill exactly one declared output, step declares {}",
                step.outputs.len()
            ),
        )),
        other => Err(RenderError::runtime(
            &step.prompt,
            format!(
                "Rendered output must be an object or a string, got {}",
                json_type_name(&other)
            ),
        )),
    }
}
