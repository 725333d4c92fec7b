//! What the storage layer persists: keyed, serializable documents

use std::fmt::Debug;
use std::hash::Hash;

use serde::{de::DeserializeOwned, Serialize};

/// Identifier a document is stored under
///
/// The file backend uses keys verbatim as file names, see [`is_file_name_safe`].
pub trait StorageKey: Clone + Debug + Send + Sync + Eq + Hash {
    fn as_str(&self) -> &str;
}

/// A document that knows its own key
pub trait StorageEntity: Clone + Debug + Send + Sync + Serialize + DeserializeOwned {
    type Key: StorageKey;

    fn key(&self) -> &Self::Key;
}

/// Whether a key can name a file inside the storage directory without escaping it
pub fn is_file_name_safe(key: &str) -> bool {
    !key.is_empty() && !key.starts_with('.') && !key.contains(['/', '\\'])
}
