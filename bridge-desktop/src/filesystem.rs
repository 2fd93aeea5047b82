//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{is_hidden_name, DirectoryEntry, FileSystemAccess},
};
use bytes::Bytes;
use std::fs::{FileTimes, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Tokio-based file system implementation
///
/// The cache root defaults to the platform cache directory
/// (`~/.cache`, `~/Library/Caches`, `%LOCALAPPDATA%`), falling back to the
/// temp dir.
pub struct TokioFileSystem {
    cache_dir: PathBuf,
}

impl TokioFileSystem {
    /// Create a new file system accessor with default directories
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self { cache_dir }
    }

    /// Create a new file system accessor rooted at `cache_dir`
    pub fn with_cache_directory(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn unix_seconds(time: std::io::Result<SystemTime>) -> Option<i64> {
        time.ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| i64::try_from(d.as_secs()).ok())
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Ok(self.cache_dir.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await?)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        let mut file = fs::File::create(path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn list_directory_entries(&self, path: &Path) -> Result<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            entries.push(DirectoryEntry {
                accessed_at: Self::unix_seconds(metadata.accessed()),
                is_directory: metadata.is_dir(),
                is_hidden: is_hidden_name(&path),
                path,
            });
        }

        Ok(entries)
    }

    async fn touch(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_times(FileTimes::new().set_accessed(SystemTime::now()))?;
            Ok(())
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("touch task failed: {}", e)))?
    }
}
