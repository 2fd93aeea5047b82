//! Workspace facade crate.
//!
//! Re-exports the playback engine together with the runtime and bridge crates
//! it is configured from, so host applications can depend on `queue-player`
//! alone. The `desktop-shims` feature (default) lets `CoreConfig::builder()`
//! fall back to the reqwest/tokio adapters from `bridge-desktop`.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

pub use core_playback::{PlayerConfig, PlayerEngine, PlayerState};
pub use core_runtime::config::CoreConfig;
