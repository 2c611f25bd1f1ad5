use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The final product of a run: a file name and its full contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub file_name: &'static str,
    pub contents: String,
}

/// Persists the artifact. Each write replaces any previous content.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Returns the path that was written.
    async fn write(&self, artifact: &OutputArtifact) -> Result<PathBuf, StoreError>;
}
