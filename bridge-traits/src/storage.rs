//! File System Abstraction
//!
//! The disk cache needs a small slice of the host filesystem: a cache root,
//! atomic writes (write + rename), directory listings with access times for
//! eviction, and a way to refresh an entry's access time on a hit.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub path: PathBuf,
    /// Last access time as a Unix timestamp (seconds), when the host can
    /// report it.
    pub accessed_at: Option<i64>,
    pub is_directory: bool,
    pub is_hidden: bool,
}

impl DirectoryEntry {
    pub fn file(path: impl Into<PathBuf>, accessed_at: Option<i64>) -> Self {
        let path = path.into();
        let is_hidden = is_hidden_name(&path);
        Self {
            path,
            accessed_at,
            is_directory: false,
            is_hidden,
        }
    }
}

/// Dot-prefixed file names are treated as hidden.
pub fn is_hidden_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// File system access trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn store(fs: &dyn FileSystemAccess, data: Bytes) -> Result<()> {
///     let root = fs.get_cache_directory().await?.join("queue-player");
///     fs.create_dir_all(&root).await?;
///     fs.write_file(&root.join("clip.mp4.part"), data).await?;
///     fs.rename(&root.join("clip.mp4.part"), &root.join("clip.mp4")).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's cache directory
    ///
    /// This directory is suitable for temporary files that can be deleted
    /// by the system when storage is low.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Write data to a file, creating or truncating it
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Move `from` to `to`, replacing any existing file at `to`
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// List the immediate entries of a directory
    async fn list_directory_entries(&self, path: &Path) -> Result<Vec<DirectoryEntry>>;

    /// Set the access time of `path` to now
    async fn touch(&self, path: &Path) -> Result<()>;
}
