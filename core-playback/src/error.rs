//! # Playback Error Types

use bridge_traits::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the player engine and its cache/download pipeline.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Contract violations
    // ========================================================================
    /// An explicit index outside `[0, count)` was requested.
    #[error("Index {index} out of bounds for queue of {count} items")]
    IndexOutOfBounds { index: usize, count: usize },

    /// An operation needing the current index ran before one was set.
    #[error("Current index is not set")]
    IndexUnset,

    // ========================================================================
    // Environment faults
    // ========================================================================
    /// The cache root could not be created.
    #[error("Cache root {path:?} unavailable: {reason}")]
    CacheRootUnavailable { path: PathBuf, reason: String },

    // ========================================================================
    // Transient faults
    // ========================================================================
    #[error("Download of {identifier} failed: {reason}")]
    DownloadFailed { identifier: String, reason: String },

    #[error("Download of {identifier} returned HTTP {status}")]
    HttpStatus { identifier: String, status: u16 },

    /// The media engine rejected a command.
    #[error("Media engine error: {0}")]
    Media(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    // ========================================================================
    // Caller errors
    // ========================================================================
    #[error("Invalid player configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    /// `play` was called in the `Failed` state, which only `reset` leaves.
    #[error("Player has failed; reset before playing again")]
    PlayerFailed,

    #[error("Player engine has shut down")]
    EngineShutDown,

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` for caller misuse that no retry will fix.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            PlaybackError::IndexOutOfBounds { .. } | PlaybackError::IndexUnset
        )
    }

    /// Returns `true` if the condition is recovered by a later prefetch pass
    /// or a retried command.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::DownloadFailed { .. } | PlaybackError::Media(_) => true,
            PlaybackError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
