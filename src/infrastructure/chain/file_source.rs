//! Chain definitions stored as YAML or JSON files

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::domain::chain::{ChainDefinition, ChainSource};
use crate::domain::DomainError;

const EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Loads chains from `<root>/<reference>.{yaml,yml,json}`
#[derive(Debug, Clone)]
pub struct FileChainSource {
    root: PathBuf,
}

impl FileChainSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, reference: &str) -> Result<Vec<PathBuf>, DomainError> {
        let relative = Path::new(reference);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });

        if reference.trim().is_empty() || escapes {
            return Err(DomainError::validation(format!(
                "Chain reference '{}' must be a relative path inside the chains root",
                reference
            )));
        }

        let has_known_extension = relative
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.contains(&e));

        if has_known_extension {
            return Ok(vec![self.root.join(relative)]);
        }

        Ok(EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", reference, ext)))
            .collect())
    }
}

/// Parse a chain document, choosing the format by file extension
pub fn parse_chain(path: &Path, content: &str) -> Result<ChainDefinition, DomainError> {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");

    let parsed = if is_json {
        serde_json::from_str(content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    };

    parsed.map_err(|e| {
        DomainError::validation(format!("Invalid chain file '{}': {}", path.display(), e))
    })
}

#[async_trait]
impl ChainSource for FileChainSource {
    async fn load(&self, reference: &str) -> Result<ChainDefinition, DomainError> {
        for path in self.candidates(reference)? {
            match fs::read_to_string(&path).await {
                Ok(content) => return parse_chain(&path, &content),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(DomainError::storage(format!(
                        "Failed to read '{}': {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        Err(DomainError::not_found(format!(
            "Chain '{}' not found under '{}'",
            reference,
            self.root.display()
        )))
    }

    async fn list(&self) -> Result<Vec<String>, DomainError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut references = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let known = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| EXTENSIONS.contains(&e));
            if !known {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                references.push(stem.to_string());
            }
        }

        references.sort();
        references.dedup();
        Ok(references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const YAML_CHAIN: &str = r#"
name: blog
version: "1"
steps:
  - id: outline
    prompt: blog/outline
    inputs: [topic]
    outputs: [outline]
"#;

    #[tokio::test]
    async fn test_load_yaml_by_stem() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blog.yaml"), YAML_CHAIN).unwrap();
        let source = FileChainSource::new(dir.path());

        let chain = source.load("blog").await.unwrap();
        assert_eq!(chain.name, "blog");
        assert_eq!(chain.steps[0].prompt, "blog/outline");
    }

    #[tokio::test]
    async fn test_load_json_with_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tiny.json"),
            r#"{"name":"tiny","version":"1","steps":[{"id":"a","prompt":"a"}]}"#,
        )
        .unwrap();
        let source = FileChainSource::new(dir.path());

        let chain = source.load("tiny.json").await.unwrap();
        assert_eq!(chain.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_and_invalid() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.yml"), "name: [unclosed").unwrap();
        let source = FileChainSource::new(dir.path());

        assert!(source.load("absent").await.unwrap_err().is_not_found());
        assert!(matches!(
            source.load("broken").await.unwrap_err(),
            DomainError::Validation { .. }
        ));
        assert!(source.load("../outside").await.is_err());
    }

    #[tokio::test]
    async fn test_list() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.yaml"), YAML_CHAIN).unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();

        let source = FileChainSource::new(dir.path());
        assert_eq!(source.list().await.unwrap(), vec!["a", "b"]);
    }
}
