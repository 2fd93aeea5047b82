//! Media engine bridge traits.
//!
//! The core never decodes or renders anything itself. It hands local files
//! to a host [`MediaEngine`] (a queueing player such as AVQueuePlayer,
//! GStreamer playbin or ExoPlayer) and reacts to the [`MediaEvent`]s the
//! engine reports back.

use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;

/// Handle for an item enqueued in a [`MediaEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaItemId(Uuid);

impl MediaItemId {
    /// Generate a new item identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MediaItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Notification raised by the media engine.
///
/// `ItemReady` and `ItemFailed` are reported at most once per enqueued item.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// The item finished loading and can be played.
    ItemReady(MediaItemId),
    /// The item could not be made playable.
    ItemFailed { id: MediaItemId, reason: String },
    /// Playback reached the natural end of the item.
    ItemEnded(MediaItemId),
    /// Playback stalled waiting for data.
    Stalled,
    /// Another audio client took over the output.
    InterruptionBegan,
    /// The interruption finished; `should_resume` mirrors the platform hint.
    InterruptionEnded { should_resume: bool },
}

/// Opaque presentation target (a video layer, a window handle, ...).
///
/// Hosts downcast through [`RenderSurface::as_any`] to their own type.
pub trait RenderSurface: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Stream of media engine notifications.
#[async_trait]
pub trait MediaEventStream: Send {
    /// Get the next event
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<MediaEvent>;
}

/// Host media playback engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Append a local file to the engine's play queue.
    async fn enqueue(&self, path: &Path) -> Result<MediaItemId>;

    /// Start or resume playback of the current item.
    async fn play(&self) -> Result<()>;

    /// Pause playback without dropping queued items.
    async fn pause(&self) -> Result<()>;

    /// Make `id` the current item.
    async fn skip_to(&self, id: MediaItemId) -> Result<()>;

    /// Drop every queued item.
    async fn remove_all(&self) -> Result<()>;

    /// Output volume in `0.0..=1.0`.
    async fn volume(&self) -> Result<f32>;

    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Bind the presentation target used for video output.
    async fn attach_surface(&self, surface: Arc<dyn RenderSurface>) -> Result<()>;

    /// Subscribe to engine notifications.
    async fn subscribe(&self) -> Result<Box<dyn MediaEventStream>>;
}
