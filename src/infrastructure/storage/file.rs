//! File-backed storage implementation
//!
//! One pretty-printed JSON document per entity, named `<key>.json`, inside a
//! single directory. Writes go to a temporary file in the same directory and
//! are renamed over the target, so readers never observe a partial document.

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::domain::storage::{is_file_name_safe, Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

const EXTENSION: &str = "json";

/// JSON-file-per-entity storage
pub struct FileStorage<E> {
    dir: PathBuf,
    _entity: PhantomData<fn() -> E>,
}

impl<E> std::fmt::Debug for FileStorage<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage").field("dir", &self.dir).finish()
    }
}

impl<E> FileStorage<E>
where
    E: StorageEntity,
{
    /// Create storage rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _entity: PhantomData,
        }
    }

    /// Create storage rooted at `dir`, creating the directory now
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let storage = Self::new(dir);
        fs::create_dir_all(&storage.dir).await.map_err(|e| {
            DomainError::storage(format!(
                "Failed to create storage directory '{}': {}",
                storage.dir.display(),
                e
            ))
        })?;
        Ok(storage)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, DomainError> {
        if !is_file_name_safe(key) {
            return Err(DomainError::invalid_id(format!(
                "Key '{}' cannot be used as a file name",
                key
            )));
        }
        Ok(self.dir.join(format!("{}.{}", key, EXTENSION)))
    }

    async fn read(&self, key: &str) -> Result<Option<E>, DomainError> {
        let path = self.path_for(key)?;

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DomainError::storage(format!(
                    "Failed to read '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            DomainError::storage(format!("Corrupt document '{}': {}", path.display(), e))
        })
    }
}

#[async_trait]
impl<E> Storage<E> for FileStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        self.read(key.as_str()).await
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        let mut entities = Vec::new();

        for key in self.keys().await? {
            if let Some(entity) = self.read(&key).await? {
                entities.push(entity);
            }
        }

        Ok(entities)
    }

    async fn keys(&self) -> Result<Vec<String>, DomainError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    keys.push(stem.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn save(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let path = self.path_for(&key)?;

        let json = serde_json::to_string_pretty(&entity).map_err(|e| {
            DomainError::storage(format!("Failed to serialize '{}': {}", key, e))
        })?;

        fs::create_dir_all(&self.dir).await?;

        let suffix: u32 = rand::random();
        let tmp = self.dir.join(format!(".{}.{:08x}.tmp", key, suffix));

        if let Err(e) = fs::write(&tmp, json.as_bytes()).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(DomainError::storage(format!(
                "Failed to write '{}': {}",
                tmp.display(),
                e
            )));
        }

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(DomainError::storage(format!(
                "Failed to replace '{}': {}",
                path.display(),
                e
            )));
        }

        debug!(path = %path.display(), "Persisted document");
        Ok(entity)
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
        let path = self.path_for(key.as_str())?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to delete '{}': {}",
                path.display(),
                e
            ))),
        }
    }
}
