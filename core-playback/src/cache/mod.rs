//! # Disk Cache
//!
//! Downloaded media lives under `<host cache dir>/<cache_directory>/`, one
//! file per queue item, named by [`CacheKeyStrategy`]. Entries are evicted by
//! age of last access during a once-per-engine sweep.
//!
//! ```text
//! ~/.cache/queue-player/
//! ├── ep01.mp4          <- cached, access time refreshed on every hit
//! ├── ep02.mp4
//! └── ep03.mp4.4.part   <- write in progress, renamed when complete
//! ```

pub mod disk;
pub mod key;

pub use disk::{DiskCache, SweepReport};
pub use key::CacheKeyStrategy;
