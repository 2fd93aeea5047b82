//! # Core Configuration Module
//!
//! [`CoreConfig`] is the capability container the player is built from: every
//! host collaborator the core talks to, plus an optional cache root override.
//!
//! ## Capabilities
//!
//! | Capability | Required | Default |
//! |------------|----------|---------|
//! | `MediaEngine` | yes | none, always host specific |
//! | `HttpClient` | yes | `ReqwestHttpClient` with `desktop-shims` |
//! | `FileSystemAccess` | yes | `TokioFileSystem` with `desktop-shims` |
//! | `PlaybackLifecycle` | no | `NoopPlaybackLifecycle` |
//! | `Clock` | no | `SystemClock` |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_engine(Arc::new(MyAvPlayer::new()))
//!     .lifecycle(Arc::new(MyAudioSession::new()))
//!     .cache_dir("/var/cache/kiosk")
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! `build()` fails fast with [`Error::CapabilityMissing`] naming the missing
//! trait and where an implementation is expected to come from.

use crate::error::{Error, Result};
use bridge_traits::{
    Clock, FileSystemAccess, HttpClient, MediaEngine, NoopPlaybackLifecycle, PlaybackLifecycle,
    SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Host capabilities required by the player.
#[derive(Clone)]
pub struct CoreConfig {
    /// Decodes and presents local media files
    pub media_engine: Arc<dyn MediaEngine>,

    /// Fetches remote payloads
    pub http_client: Arc<dyn HttpClient>,

    /// Cache directory, listings and atomic writes
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Background execution and audio-session toggles
    pub lifecycle: Arc<dyn PlaybackLifecycle>,

    /// Time source for cache eviction
    pub clock: Arc<dyn Clock>,

    /// Overrides the directory the player cache folder is created in.
    /// `None` uses `FileSystemAccess::get_cache_directory`.
    pub cache_dir: Option<PathBuf>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("media_engine", &"MediaEngine { ... }")
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("lifecycle", &"PlaybackLifecycle { ... }")
            .field("clock", &"Clock { ... }")
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

fn media_engine_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaEngine".to_string(),
        message: "A MediaEngine implementation is required to play cached files. \
                 Inject the host player (AVQueuePlayer, ExoPlayer, GStreamer playbin)."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Mobile: inject a platform-native adapter."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn file_system_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "No file system implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
                 Mobile: inject sandboxed cache directory access."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(file_system_missing_error())
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    media_engine: Option<Arc<dyn MediaEngine>>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    lifecycle: Option<Arc<dyn PlaybackLifecycle>>,
    clock: Option<Arc<dyn Clock>>,
    cache_dir: Option<PathBuf>,
}

impl CoreConfigBuilder {
    pub fn media_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.media_engine = Some(engine);
        self
    }

    /// Sets the HTTP client. Optional with `desktop-shims`.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system. Optional with `desktop-shims`.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn lifecycle(mut self, lifecycle: Arc<dyn PlaybackLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the directory the player cache folder is created in.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required capability has no
    ///   implementation and no default
    /// - [`Error::Config`] when `cache_dir` is set to an empty path
    pub fn build(self) -> Result<CoreConfig> {
        if let Some(dir) = &self.cache_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config("Cache directory cannot be empty".to_string()));
            }
        }

        let media_engine = self.media_engine.ok_or_else(media_engine_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let lifecycle = self
            .lifecycle
            .unwrap_or_else(|| Arc::new(NoopPlaybackLifecycle));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(CoreConfig {
            media_engine,
            http_client,
            file_system,
            lifecycle,
            clock,
            cache_dir: self.cache_dir,
        })
    }
}
