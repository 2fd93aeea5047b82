//! # Player Configuration

use crate::cache::CacheKeyStrategy;
use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DAY: u64 = 24 * 60 * 60;

/// Tunables for prefetching and the disk cache.
///
/// Settable before engine construction; the engine keeps its own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Number of queue items, starting at the current index, kept
    /// downloaded ahead of the playhead.
    ///
    /// Also the jump distance at which `play` enters `Loading`.
    ///
    /// Default: 3.
    #[serde(default = "default_prefetch_window_size")]
    pub prefetch_window_size: usize,

    /// Cached files not accessed for this long are evicted by the sweep.
    ///
    /// Default: 7 days.
    #[serde(default = "default_cache_retention")]
    pub cache_retention: Duration,

    /// Folder created inside the host cache directory.
    ///
    /// Default: `"queue-player"`.
    #[serde(default = "default_cache_directory")]
    pub cache_directory: String,

    /// How identifiers map to cached file names.
    #[serde(default)]
    pub cache_key_strategy: CacheKeyStrategy,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            prefetch_window_size: default_prefetch_window_size(),
            cache_retention: default_cache_retention(),
            cache_directory: default_cache_directory(),
            cache_key_strategy: CacheKeyStrategy::default(),
        }
    }
}

impl PlayerConfig {
    pub fn with_prefetch_window_size(mut self, size: usize) -> Self {
        self.prefetch_window_size = size;
        self
    }

    pub fn with_cache_retention(mut self, retention: Duration) -> Self {
        self.cache_retention = retention;
        self
    }

    pub fn with_cache_directory(mut self, directory: impl Into<String>) -> Self {
        self.cache_directory = directory.into();
        self
    }

    pub fn with_cache_key_strategy(mut self, strategy: CacheKeyStrategy) -> Self {
        self.cache_key_strategy = strategy;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.prefetch_window_size == 0 {
            return Err(invalid("prefetch_window_size must be > 0"));
        }

        let directory = self.cache_directory.trim();
        if directory.is_empty() {
            return Err(invalid("cache_directory cannot be empty"));
        }
        if directory.contains(['/', '\\']) || directory == "." || directory == ".." {
            return Err(invalid("cache_directory must be a single folder name"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> PlaybackError {
    PlaybackError::InvalidConfig(message.to_string())
}

fn default_prefetch_window_size() -> usize {
    3
}

fn default_cache_retention() -> Duration {
    Duration::from_secs(7 * DAY)
}

fn default_cache_directory() -> String {
    "queue-player".to_string()
}
