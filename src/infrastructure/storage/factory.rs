//! Storage factory for runtime storage selection

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;

use super::file::FileStorage;
use super::in_memory::InMemoryStorage;

/// Supported storage types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// JSON files on disk
    File,
    /// In-memory storage (for testing/dry runs)
    InMemory,
}

impl StorageType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "file" | "fs" | "filesystem" => Some(Self::File),
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    File { dir: PathBuf },
    InMemory,
}

impl StorageConfig {
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self::File { dir: dir.into() }
    }

    pub fn in_memory() -> Self {
        Self::InMemory
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::File { .. } => StorageType::File,
            Self::InMemory => StorageType::InMemory,
        }
    }
}

/// Factory for creating storage instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates a storage instance based on the configuration
    pub async fn create<E>(config: &StorageConfig) -> Result<Arc<dyn Storage<E>>, DomainError>
    where
        E: StorageEntity + 'static,
    {
        match config {
            StorageConfig::File { dir } => Ok(Arc::new(FileStorage::<E>::open(dir.clone()).await?)),
            StorageConfig::InMemory => Ok(Arc::new(InMemoryStorage::<E>::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow_state::WorkflowData;

    #[test]
    fn test_storage_type_parse() {
        assert_eq!(StorageType::parse("file"), Some(StorageType::File));
        assert_eq!(StorageType::parse("Memory"), Some(StorageType::InMemory));
        assert_eq!(StorageType::parse("in-memory"), Some(StorageType::InMemory));
        assert_eq!(StorageType::parse("postgres"), None);
    }

    #[tokio::test]
    async fn test_create_file_storage_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("workflows");

        let storage = StorageFactory::create::<WorkflowData>(&StorageConfig::file(&target))
            .await
            .unwrap();

        assert!(target.is_dir());
        assert_eq!(storage.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_in_memory() {
        let config = StorageConfig::in_memory();
        assert_eq!(config.storage_type(), StorageType::InMemory);

        let storage = StorageFactory::create::<WorkflowData>(&config).await.unwrap();
        assert!(storage.keys().await.unwrap().is_empty());
    }
}
