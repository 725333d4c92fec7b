//! Template sources resolved under a prompts root directory

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::domain::chain::{RenderError, TemplateSource};

pub const DEFAULT_EXTENSION: &str = "hbs";

/// Templates stored as files below a root directory
#[derive(Debug, Clone)]
pub struct PromptsDirectory {
    root: PathBuf,
    extension: String,
}

impl PromptsDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Extension appended to references that have none
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a template reference to a file path inside the root
    pub fn resolve(&self, reference: &str) -> Result<PathBuf, RenderError> {
        let relative = Path::new(reference);

        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if reference.trim().is_empty() || escapes {
            return Err(RenderError::io(
                reference,
                "template references must be relative paths inside the prompts root",
            ));
        }

        let mut path = self.root.join(relative);
        if relative.extension().is_none() {
            path.set_extension(&self.extension);
        }

        Ok(path)
    }
}

#[async_trait]
impl TemplateSource for PromptsDirectory {
    async fn load(&self, reference: &str) -> Result<String, RenderError> {
        let path = self.resolve(reference)?;

        fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => RenderError::not_found(reference),
            _ => RenderError::io(reference, e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_adds_default_extension() {
        let prompts = PromptsDirectory::new("/srv/prompts");
        assert_eq!(
            prompts.resolve("blog/outline").unwrap(),
            PathBuf::from("/srv/prompts/blog/outline.hbs")
        );
        assert_eq!(
            prompts.resolve("blog/outline.txt").unwrap(),
            PathBuf::from("/srv/prompts/blog/outline.txt")
        );
    }

    #[test]
    fn test_resolve_custom_extension() {
        let prompts = PromptsDirectory::new("p").with_extension(".handlebars");
        assert_eq!(
            prompts.resolve("x").unwrap(),
            PathBuf::from("p/x.handlebars")
        );
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let prompts = PromptsDirectory::new("/srv/prompts");
        assert!(prompts.resolve("../secrets").is_err());
        assert!(prompts.resolve("/etc/passwd").is_err());
        assert!(prompts.resolve("a/../../b").is_err());
        assert!(prompts.resolve("").is_err());
    }

    #[tokio::test]
    async fn test_load() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("greet.hbs"), "Hello {{name}}").unwrap();
        let prompts = PromptsDirectory::new(dir.path());

        assert_eq!(prompts.load("greet").await.unwrap(), "Hello {{name}}");

        let err = prompts.load("missing").await.unwrap_err();
        assert_eq!(err, RenderError::not_found("missing"));
    }
}
