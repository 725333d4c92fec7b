//! Chain source implementations

mod file_source;

pub use file_source::{parse_chain, FileChainSource};
