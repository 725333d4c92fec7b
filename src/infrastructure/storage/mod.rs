//! Storage infrastructure - Storage implementations

mod factory;
mod file;
mod in_memory;

pub use factory::{StorageConfig, StorageFactory, StorageType};
pub use file::FileStorage;
pub use in_memory::InMemoryStorage;
