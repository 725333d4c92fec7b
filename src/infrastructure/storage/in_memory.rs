//! In-memory storage implementation

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Thread-safe in-memory storage implementation
///
/// Useful for testing and dry runs. Data is lost when the process terminates.
#[derive(Debug)]
pub struct InMemoryStorage<E>
where
    E: StorageEntity,
{
    entities: RwLock<HashMap<String, E>>,
}

impl<E> Default for InMemoryStorage<E>
where
    E: StorageEntity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InMemoryStorage<E>
where
    E: StorageEntity,
{
    /// Creates a new empty in-memory storage
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }
}

fn lock_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::storage(format!("Failed to acquire storage lock: {}", e))
}

#[async_trait]
impl<E> Storage<E> for InMemoryStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        let entities = self.entities.read().map_err(lock_error)?;
        Ok(entities.get(key.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        let entities = self.entities.read().map_err(lock_error)?;

        let mut keyed: Vec<(&String, &E)> = entities.iter().collect();
        keyed.sort_by(|a, b| a.0.cmp(b.0));

        Ok(keyed.into_iter().map(|(_, e)| e.clone()).collect())
    }

    async fn keys(&self) -> Result<Vec<String>, DomainError> {
        let entities = self.entities.read().map_err(lock_error)?;

        let mut keys: Vec<String> = entities.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn save(&self, entity: E) -> Result<E, DomainError> {
        let mut entities = self.entities.write().map_err(lock_error)?;
        entities.insert(entity.key().as_str().to_string(), entity.clone());
        Ok(entity)
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
        let mut entities = self.entities.write().map_err(lock_error)?;
        Ok(entities.remove(key.as_str()).is_some())
    }

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        let entities = self.entities.read().map_err(lock_error)?;
        Ok(entities.contains_key(key.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    struct NoteId(String);

    impl StorageKey for NoteId {
        fn as_str(&self) -> &str {
            &self.0
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: NoteId,
        body: String,
    }

    impl StorageEntity for Note {
        type Key = NoteId;

        fn key(&self) -> &Self::Key {
            &self.id
        }
    }

    fn note(id: &str, body: &str) -> Note {
        Note {
            id: NoteId(id.to_string()),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let storage: InMemoryStorage<Note> = InMemoryStorage::new();
        storage.save(note("a", "first")).await.unwrap();

        let found = storage.get(&NoteId("a".to_string())).await.unwrap();
        assert_eq!(found, Some(note("a", "first")));
        assert!(storage.get(&NoteId("b".to_string())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces() {
        let storage: InMemoryStorage<Note> = InMemoryStorage::new();
        storage.save(note("a", "first")).await.unwrap();
        storage.save(note("a", "second")).await.unwrap();

        assert_eq!(storage.count().await.unwrap(), 1);
        let found = storage.get(&NoteId("a".to_string())).await.unwrap().unwrap();
        assert_eq!(found.body, "second");
    }

    #[tokio::test]
    async fn test_keys_sorted_and_delete() {
        let storage: InMemoryStorage<Note> = InMemoryStorage::new();
        for id in ["c", "a", "b"] {
            storage.save(note(id, "x")).await.unwrap();
        }

        assert_eq!(storage.keys().await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(storage.list().await.unwrap()[0].id.0, "a");

        assert!(storage.delete(&NoteId("b".to_string())).await.unwrap());
        assert!(!storage.delete(&NoteId("b".to_string())).await.unwrap());
        assert!(!storage.exists(&NoteId("b".to_string())).await.unwrap());
    }
}
