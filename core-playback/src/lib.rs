//! # Queue Playback Module
//!
//! Plays an ordered queue of remote media items from a local disk cache.
//!
//! ## Overview
//!
//! This module handles:
//! - The playback state machine and its engine façade ([`PlayerEngine`])
//! - Prefetching a window of items ahead of the playhead
//! - Deduplicated downloads into the disk cache
//! - Age-based eviction of cached files
//! - Background-execution and audio-session resource intents
//!
//! Decoding and presentation belong to the host's
//! [`MediaEngine`](bridge_traits::MediaEngine); the queue itself comes from a
//! [`PlayerDataSource`].

pub mod cache;
pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod prefetch;
pub mod state;
pub mod traits;

pub use cache::CacheKeyStrategy;
pub use config::PlayerConfig;
pub use engine::{PlayerEngine, PlayerEngineBuilder, PlayerSnapshot, ReadyItem};
pub use error::{PlaybackError, Result};
pub use state::PlayerState;
pub use traits::{PlayerDataSource, PlayerDelegate};
