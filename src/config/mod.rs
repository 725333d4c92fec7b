//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, ChainsConfig, ExecutorConfig, LogFormat, LoggingConfig, PromptsConfig,
    StorageSettings,
};
