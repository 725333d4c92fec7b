//! Application state for shared services

use std::sync::Arc;

use crate::domain::chain::ChainSource;
use crate::infrastructure::services::{AnalysisService, ExecutionService};
use crate::infrastructure::template::HelperRegistry;

/// Shared services built once from configuration
#[derive(Debug, Clone)]
pub struct AppState {
    pub execution_service: Arc<ExecutionService>,
    pub analysis_service: Arc<AnalysisService>,
    pub chain_source: Arc<dyn ChainSource>,
    pub helpers: Arc<HelperRegistry>,
}
