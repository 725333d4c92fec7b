use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::chain::ChainExecutorConfig;
use crate::domain::DomainError;
use crate::infrastructure::storage::{StorageConfig, StorageType};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub storage: StorageSettings,
    pub prompts: PromptsConfig,
    pub chains: ChainsConfig,
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `file` or `memory`
    pub backend: String,
    pub workflow_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub root: PathBuf,
    pub extension: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainsConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub preflight: bool,
    pub validate_schemas: bool,
    pub render_timeout_ms: Option<u64>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            workflow_dir: PathBuf::from("data/workflows"),
        }
    }
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("prompts"),
            extension: "hbs".to_string(),
        }
    }
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("chains"),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            preflight: true,
            validate_schemas: true,
            render_timeout_ms: None,
        }
    }
}

impl StorageSettings {
    /// Resolve the configured backend, rejecting unknown names
    pub fn storage_config(&self) -> Result<StorageConfig, DomainError> {
        match StorageType::parse(&self.backend) {
            Some(StorageType::File) => Ok(StorageConfig::file(&self.workflow_dir)),
            Some(StorageType::InMemory) => Ok(StorageConfig::in_memory()),
            None => Err(DomainError::configuration(format!(
                "Unknown storage backend '{}'",
                self.backend
            ))),
        }
    }
}

impl From<&ExecutorConfig> for ChainExecutorConfig {
    fn from(config: &ExecutorConfig) -> Self {
        Self {
            preflight: config.preflight,
            validate_schemas: config.validate_schemas,
            render_timeout_ms: config.render_timeout_ms.filter(|ms| *ms > 0),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load `<dir>/default` and `<dir>/local`, then `PROMPT_CHAIN__*` variables
    pub fn load_from(dir: &str) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{}/default", dir)).required(false))
            .add_source(config::File::with_name(&format!("{}/local", dir)).required(false))
            .add_source(
                config::Environment::with_prefix("PROMPT_CHAIN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
