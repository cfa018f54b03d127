//! Production implementation of ReferenceSource using Tokio.

use crate::error::EnvError;
use crate::ReferenceSource;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

/// Reference source backed by the local filesystem.
///
/// Paths are resolved relative to `root`, the same way a page resolves
/// `data/bks_excerpt.json` relative to its own URL.
pub struct FsReferenceSource {
    /// Directory that relative paths are resolved against
    root: PathBuf,
}

impl FsReferenceSource {
    /// Creates a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates an Arc-wrapped source for sharing.
    pub fn shared(root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self::new(root))
    }
}

#[async_trait]
impl ReferenceSource for FsReferenceSource {
    async fn fetch(&self, path: &str) -> Result<String, EnvError> {
        let full = self.root.join(path);
        tokio::fs::read_to_string(&full).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => EnvError::not_found(full.display()),
            _ => EnvError::Io(e),
        })
    }
}
