use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::output::{ArtifactStore, OutputArtifact, StoreError};

/// Writes artifacts into a directory on the local filesystem.
///
/// Content goes to a sibling `.tmp` file first and is then renamed over the
/// target, so a failed write never leaves a half-written artifact behind.
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn write(&self, artifact: &OutputArtifact) -> Result<PathBuf, StoreError> {
        let path = self.dir.join(artifact.file_name);
        let tmp_path = self.dir.join(format!("{}.tmp", artifact.file_name));
        let io_error = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).await.map_err(io_error)?;
        if let Err(source) = fs::write(&tmp_path, artifact.contents.as_bytes()).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(io_error(source));
        }
        if let Err(source) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(io_error(source));
        }

        tracing::debug!("Wrote {} bytes to {}", artifact.contents.len(), path.display());
        Ok(path)
    }
}
