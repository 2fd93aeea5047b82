//! Host-facing data source and delegate traits.

use crate::state::PlayerState;
use bridge_traits::RenderSurface;
use std::sync::Arc;

/// Supplies the queue the player walks through.
///
/// The queue is owned by the host and may grow between calls; the engine
/// asks for the count every time it needs it.
pub trait PlayerDataSource: Send + Sync {
    /// Number of items currently in the queue.
    fn item_count(&self) -> usize;

    /// Remote identifier (URL) of the item at `index`.
    ///
    /// Only called with `index < item_count()`.
    fn item_identifier(&self, index: usize) -> String;

    /// Surface the media engine should render video into, if any.
    fn render_surface(&self) -> Option<Arc<dyn RenderSurface>> {
        None
    }
}

/// Receives player notifications. Both callbacks default to no-ops.
///
/// Callbacks run on the engine task; keep them short.
pub trait PlayerDelegate: Send + Sync {
    /// Called once per effective state change.
    fn on_state_changed(&self, _state: PlayerState) {}

    /// Called when the last queue item finished, right before the player
    /// resets itself.
    fn on_queue_ended(&self) {}
}
