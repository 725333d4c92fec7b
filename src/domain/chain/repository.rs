//! Chain definition source trait

use async_trait::async_trait;

use super::entity::ChainDefinition;
use crate::domain::DomainError;

/// Loads chain definitions by reference
#[async_trait]
pub trait ChainSource: Send + Sync + std::fmt::Debug {
    /// Load a chain, `NotFound` if the reference resolves to nothing
    async fn load(&self, reference: &str) -> Result<ChainDefinition, DomainError>;

    /// References of every available chain, sorted
    async fn list(&self) -> Result<Vec<String>, DomainError>;
}
