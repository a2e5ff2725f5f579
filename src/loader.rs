//! Script sources and the loaders that resolve references to text.
//!
//! The default `FileLoader` reads from disk. When constructed with a root it
//! behaves like a sandbox: no remote URLs, no escaping the root, .js/.mjs only.

use anyhow::{anyhow, Error};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// One entry of an ordered `run_multi` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceItem {
    /// Opaque locator resolved asynchronously by a `SourceLoader`.
    Reference(String),
    /// Literal source text with the label used in stack traces.
    Inline { source: String, label: String },
}

impl SourceItem {
    pub fn reference(reference: impl Into<String>) -> Self {
        SourceItem::Reference(reference.into())
    }

    pub fn inline(source: impl Into<String>, label: impl Into<String>) -> Self {
        SourceItem::Inline {
            source: source.into(),
            label: label.into(),
        }
    }

    /// Name the item executes under.
    pub fn label(&self) -> &str {
        match self {
            SourceItem::Reference(reference) => reference,
            SourceItem::Inline { label, .. } => label,
        }
    }
}

impl From<&str> for SourceItem {
    fn from(reference: &str) -> Self {
        SourceItem::reference(reference)
    }
}

impl From<(&str, &str)> for SourceItem {
    fn from((source, label): (&str, &str)) -> Self {
        SourceItem::inline(source, label)
    }
}

pub type LoadFuture = Pin<Box<dyn Future<Output = Result<String, Error>> + Send>>;

/// Resolves a reference to script text.
///
/// `load` is called synchronously for every reference of a batch; the
/// returned futures are then driven concurrently, so they must not borrow
/// from the loader.
pub trait SourceLoader {
    fn load(&self, reference: &str) -> LoadFuture;
}

/// Loads references from the filesystem, optionally confined to a directory.
pub struct FileLoader {
    allowed_dir: Option<PathBuf>,
}

impl FileLoader {
    /// Paths are used as given, relative to the working directory.
    pub fn unrestricted() -> Self {
        Self { allowed_dir: None }
    }

    /// Only files inside `allowed_dir` may be loaded; relative references
    /// resolve against it.
    pub fn sandboxed(allowed_dir: impl AsRef<Path>) -> Result<Self, Error> {
        let canonical = allowed_dir
            .as_ref()
            .canonicalize()
            .map_err(|e| anyhow!("Failed to canonicalize script root: {}", e))?;

        if !canonical.is_dir() {
            return Err(anyhow!("script root must be a directory"));
        }

        Ok(Self {
            allowed_dir: Some(canonical),
        })
    }

    /// Validate file extension is allowed (.js or .mjs only)
    fn is_extension_allowed(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("js") | Some("mjs")
        )
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, Error> {
        if reference.starts_with("http://")
            || reference.starts_with("https://")
            || reference.starts_with("data:")
            || reference.starts_with("blob:")
        {
            return Err(anyhow!("Remote scripts are not supported: {}", reference));
        }

        let path = reference
            .strip_prefix("file://")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(reference));

        let Some(root) = &self.allowed_dir else {
            return Ok(path);
        };

        let candidate = if path.is_absolute() { path } else { root.join(path) };

        // Canonicalization resolves symlinks and `..` before the prefix check
        let canonical = candidate
            .canonicalize()
            .map_err(|e| anyhow!("Failed to resolve '{}': {}", candidate.display(), e))?;

        if !canonical.starts_with(root) {
            return Err(anyhow!(
                "Access denied: '{}' is outside the script root",
                canonical.display()
            ));
        }

        if !Self::is_extension_allowed(&canonical) {
            return Err(anyhow!(
                "Only .js and .mjs files allowed, got: {}",
                canonical.display()
            ));
        }

        Ok(canonical)
    }
}

impl SourceLoader for FileLoader {
    fn load(&self, reference: &str) -> LoadFuture {
        let resolved = self.resolve(reference);
        Box::pin(async move {
            let path = resolved?;
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| anyhow!("Failed to read '{}': {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_blocks_remote_urls() {
        let dir = tempdir().unwrap();
        let loader = FileLoader::sandboxed(dir.path()).unwrap();

        let result = loader.resolve("https://evil.com/payload.js");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Remote scripts"));
    }

    #[test]
    fn test_blocks_path_traversal() {
        let outer = tempdir().unwrap();
        let root = outer.path().join("scripts");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("secret.js"), "var secret = 1;").unwrap();
        let loader = FileLoader::sandboxed(&root).unwrap();

        let result = loader.resolve("../secret.js");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Access denied"));
    }

    #[test]
    fn test_resolves_relative_to_root() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.js"), "var app = 1;").unwrap();
        let loader = FileLoader::sandboxed(dir.path()).unwrap();

        let resolved = loader.resolve("app.js").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("app.js"));
    }

    #[test]
    fn test_blocks_non_js_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("data.json"), "{}").unwrap();
        let loader = FileLoader::sandboxed(dir.path()).unwrap();

        let result = loader.resolve("data.json");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Only .js and .mjs"));
    }

    #[test]
    fn test_item_labels() {
        assert_eq!(SourceItem::from("lib/angular.js").label(), "lib/angular.js");
        assert_eq!(SourceItem::from(("x = 1;", "inline-a")).label(), "inline-a");
    }

    #[tokio::test]
    async fn test_unrestricted_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("any.txt");
        fs::write(&path, "var any = true;").unwrap();

        let text = FileLoader::unrestricted()
            .load(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(text, "var any = true;");
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let err = FileLoader::unrestricted()
            .load("missing/path.js")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing/path.js"));
    }
}
