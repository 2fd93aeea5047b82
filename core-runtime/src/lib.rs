//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the player crates:
//! - [`config`]: host capability container with fail-fast validation
//! - [`logging`]: `tracing` subscriber setup and host log forwarding
//! - [`events`]: broadcast event bus for playback, cache and download events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
