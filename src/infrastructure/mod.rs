//! Infrastructure layer - File-system, template engine and storage implementations

pub mod chain;
pub mod logging;
pub mod services;
pub mod storage;
pub mod template;
pub mod workflow_state;
