//! Disk cache of downloaded media payloads.

use crate::cache::CacheKeyStrategy;
use crate::error::{PlaybackError, Result};
use bridge_traits::{Clock, FileSystemAccess};
use bytes::Bytes;
use core_runtime::logging::{redact_url, strip_path};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Outcome of a [`DiskCache::sweep`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub retained: usize,
    /// Entries that were due for eviction but could not be deleted.
    pub failed: usize,
}

/// Maps remote identifiers to files under a single cache root.
///
/// The root may be shared with other engines in the same process; sweeps
/// are not coordinated between them.
pub struct DiskCache {
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn Clock>,
    root: PathBuf,
    key_strategy: CacheKeyStrategy,
    write_seq: AtomicU64,
}

impl DiskCache {
    pub fn new(
        fs: Arc<dyn FileSystemAccess>,
        clock: Arc<dyn Clock>,
        root: PathBuf,
        key_strategy: CacheKeyStrategy,
    ) -> Self {
        Self {
            fs,
            clock,
            root,
            key_strategy,
            write_seq: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the cache root if needed.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::CacheRootUnavailable`] when the directory cannot be
    /// created. Callers treat this as fatal.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn ensure_root(&self) -> Result<()> {
        self.fs
            .create_dir_all(&self.root)
            .await
            .map_err(|e| PlaybackError::CacheRootUnavailable {
                path: self.root.clone(),
                reason: e.to_string(),
            })?;
        debug!("Cache root ready");
        Ok(())
    }

    /// Deterministic local path for `identifier`.
    pub fn local_path(&self, identifier: &str) -> PathBuf {
        self.root.join(self.key_strategy.file_name(identifier))
    }

    pub async fn has(&self, identifier: &str) -> Result<bool> {
        Ok(self.fs.exists(&self.local_path(identifier)).await?)
    }

    /// Refreshes the access time of a cached entry.
    pub async fn touch(&self, identifier: &str) -> Result<()> {
        Ok(self.fs.touch(&self.local_path(identifier)).await?)
    }

    /// Writes `data` for `identifier` and returns the final path.
    ///
    /// The payload lands in a unique `.part` file first and is renamed into
    /// place, so readers never observe a partial entry.
    #[instrument(skip_all, fields(identifier = %redact_url(identifier), size = data.len()))]
    pub async fn write(&self, identifier: &str, data: Bytes) -> Result<PathBuf> {
        let final_path = self.local_path(identifier);
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let file_name = final_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let part_path = self.root.join(format!("{}.{}.part", file_name, seq));

        self.fs.write_file(&part_path, data).await?;
        if let Err(e) = self.fs.rename(&part_path, &final_path).await {
            if let Err(cleanup) = self.fs.delete_file(&part_path).await {
                debug!(error = %cleanup, "Could not remove partial file");
            }
            return Err(e.into());
        }

        debug!(file = %strip_path(&final_path.to_string_lossy()), "Cached payload");
        Ok(final_path)
    }

    /// Deletes entries whose last access is at or before `now - max_age`.
    ///
    /// Directories and hidden entries are left alone; entries without an
    /// access time are kept. Individual delete failures are logged and
    /// counted, not returned.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn sweep(&self, max_age: Duration) -> Result<SweepReport> {
        let cutoff = self.clock.timestamp_before(max_age);
        let entries = self
            .fs
            .list_directory_entries(&self.root)
            .await
            .map_err(|e| PlaybackError::CacheError(format!("listing cache root: {}", e)))?;

        let mut report = SweepReport::default();
        for entry in entries {
            if entry.is_directory || entry.is_hidden {
                continue;
            }

            let expired = matches!(entry.accessed_at, Some(at) if at <= cutoff);
            if !expired {
                report.retained += 1;
                continue;
            }

            match self.fs.delete_file(&entry.path).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!(
                        file = %strip_path(&entry.path.to_string_lossy()),
                        error = %e,
                        "Failed to evict cache entry"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            removed = report.removed,
            retained = report.retained,
            failed = report.failed,
            "Cache sweep finished"
        );
        Ok(report)
    }
}
