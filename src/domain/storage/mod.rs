//! Storage domain - Generic storage abstraction layer

mod entity;
mod repository;

pub use entity::{is_file_name_safe, StorageEntity, StorageKey};
pub use repository::Storage;
