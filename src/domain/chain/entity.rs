//! Chain definition entities

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::workflow_state::{CheckpointInfo, CheckpointInputType};

/// Human-in-the-loop gate evaluated before a step runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCheckpoint {
    pub input_type: CheckpointInputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub output_field: String,
}

/// A single template render within a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStep {
    pub id: String,
    /// Template reference, resolved by the renderer
    pub prompt: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Raw output name -> workflow attribute name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapper: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<StepCheckpoint>,
}

impl ChainStep {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            mapper: None,
            description: None,
            checkpoint: None,
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mapping(mut self, raw: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.mapper
            .get_or_insert_with(HashMap::new)
            .insert(raw.into(), canonical.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: StepCheckpoint) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Canonical workflow attribute name for a raw output name
    pub fn canonical_name<'a>(&'a self, raw: &'a str) -> &'a str {
        self.mapper
            .as_ref()
            .and_then(|m| m.get(raw))
            .map(String::as_str)
            .unwrap_or(raw)
    }

    /// The pending checkpoint this step would raise
    pub fn checkpoint_info(&self) -> Option<CheckpointInfo> {
        self.checkpoint.as_ref().map(|c| CheckpointInfo {
            template_path: self.prompt.clone(),
            input_type: c.input_type,
            options: c.options.clone(),
            output_field: c.output_field.clone(),
        })
    }
}

/// An ordered sequence of template renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: String,
    pub steps: Vec<ChainStep>,
}

impl ChainDefinition {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version: version.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_step(mut self, step: ChainStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Index of the step with the given ID
    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Check structural invariants, returning every violation found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("Chain name cannot be empty".to_string());
        }

        if self.version.trim().is_empty() {
            problems.push("Chain version cannot be empty".to_string());
        }

        if self.steps.is_empty() {
            problems.push("Chain must have at least one step".to_string());
        }

        let mut seen = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                problems.push(format!("Step {} has an empty id", index));
            } else if !seen.insert(step.id.as_str()) {
                problems.push(format!("Duplicate step id '{}'", step.id));
            }

            if step.prompt.trim().is_empty() {
                problems.push(format!("Step '{}' has an empty prompt", step.id));
            }

            if let Some(mapper) = &step.mapper {
                let mut keys: Vec<&String> = mapper.keys().collect();
                keys.sort();
                for raw in keys {
                    if !step.outputs.contains(raw) {
                        problems.push(format!(
                            "Step '{}' maps '{}' which is not a declared output",
                            step.id, raw
                        ));
                    }
                }
            }

            if let Some(checkpoint) = &step.checkpoint {
                if checkpoint.output_field.trim().is_empty() {
                    problems.push(format!("Step '{}' checkpoint has no output field", step.id));
                }
                if checkpoint.input_type == CheckpointInputType::Selection
                    && checkpoint.options.as_ref().is_none_or(|o| o.is_empty())
                {
                    problems.push(format!(
                        "Step '{}' selection checkpoint needs options",
                        step.id
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}
