//! # Desktop Bridge Implementations
//!
//! Default host adapters for macOS, Windows and Linux:
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`, rooted in the platform cache dir
//! - `PlaybackLifecycle` as logging toggles (desktop processes are never
//!   suspended and have no audio session to negotiate)
//!
//! The media engine has no desktop default; hosts plug in their own player.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopPlaybackLifecycle, ReqwestHttpClient, TokioFileSystem};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(ReqwestHttpClient::new()))
//!     .file_system(Arc::new(TokioFileSystem::new()))
//!     .lifecycle(Arc::new(DesktopPlaybackLifecycle::new()))
//!     .build()?;
//! ```

mod filesystem;
mod http;
mod lifecycle;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use lifecycle::DesktopPlaybackLifecycle;
