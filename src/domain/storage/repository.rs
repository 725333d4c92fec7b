//! Storage trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::StorageEntity;

/// Generic storage trait for whole-entity persistence
///
/// Writes always replace the full persisted representation of an entity.
/// Backends provide no mutual exclusion between callers: two concurrent
/// `save` calls for the same key race and the last one wins.
#[async_trait]
pub trait Storage<E>: Send + Sync + Debug
where
    E: StorageEntity + 'static,
{
    /// Retrieves an entity by its key
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError>;

    /// Retrieves all entities
    async fn list(&self) -> Result<Vec<E>, DomainError>;

    /// Returns the keys of all stored entities, sorted
    async fn keys(&self) -> Result<Vec<String>, DomainError>;

    /// Creates or replaces an entity
    async fn save(&self, entity: E) -> Result<E, DomainError>;

    /// Deletes an entity by its key, returns true if something was deleted
    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError>;

    /// Checks if an entity exists by its key
    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Returns the count of entities
    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.keys().await?.len())
    }
}
