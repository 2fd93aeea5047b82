//! # Host Bridge Traits
//!
//! Contracts between the queue player core and the host platform.
//!
//! The core decides *what* to download, cache and play; everything that
//! touches the outside world goes through one of these traits:
//!
//! - [`HttpClient`](http::HttpClient) - fetches media payloads
//! - [`FileSystemAccess`](storage::FileSystemAccess) - cache root, atomic writes, access times
//! - [`MediaEngine`](playback::MediaEngine) - decodes and plays local files, reports [`MediaEvent`](playback::MediaEvent)s
//! - [`PlaybackLifecycle`](lifecycle::PlaybackLifecycle) - background execution and audio-session toggles
//! - [`Clock`](time::Clock) - time source for cache eviction
//! - [`LoggerSink`](time::LoggerSink) - forwards structured logs to host logging
//!
//! `bridge-desktop` ships adapters for the first four (minus the media
//! engine, which is always host specific).
//!
//! ## Errors
//!
//! Every trait reports failures as [`BridgeError`](error::BridgeError).
//! Adapters should convert platform errors and keep the path or URL in the
//! message.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so the core can drive them from tokio
//! tasks.

pub mod error;
pub mod http;
pub mod lifecycle;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use lifecycle::{NoopPlaybackLifecycle, PlaybackLifecycle};
pub use playback::{MediaEngine, MediaEvent, MediaEventStream, MediaItemId, RenderSurface};
pub use storage::{DirectoryEntry, FileSystemAccess};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
