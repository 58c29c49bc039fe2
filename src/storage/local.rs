//! Local filesystem storage implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::StateSnapshot;
use crate::storage::StateStore;

/// State kept in one JSON file on disk.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for LocalStorage {
    async fn load(&self) -> Result<StateSnapshot> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "No saved state at {}, starting fresh",
                    self.path.display()
                );
                Ok(StateSnapshot::default())
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.write_bytes(&bytes).await?;
        log::debug!(
            "Saved state of {} sources to {}",
            snapshot.sources.len(),
            self.path.display()
        );
        Ok(())
    }
}
