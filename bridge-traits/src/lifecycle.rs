//! Platform resource lifecycle hooks.
//!
//! Playback needs two process-wide resources while it is active: permission to
//! keep running in the background and an active audio session. Both are plain
//! toggles; hosts without such concepts use [`NoopPlaybackLifecycle`].

use async_trait::async_trait;

use crate::error::Result;

/// Host hooks for background execution and audio-session activation.
///
/// Failures are reported so they can be logged; the player never retries or
/// changes state because of them.
#[async_trait]
pub trait PlaybackLifecycle: Send + Sync {
    /// Ask the platform to keep the process running in the background.
    async fn begin_background_execution(&self) -> Result<()>;

    /// Release the background execution assertion.
    async fn end_background_execution(&self) -> Result<()>;

    /// Activate the audio session for playback.
    async fn activate_audio_session(&self) -> Result<()>;

    /// Deactivate the audio session.
    async fn deactivate_audio_session(&self) -> Result<()>;
}

/// Lifecycle implementation for headless and server contexts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPlaybackLifecycle;

#[async_trait]
impl PlaybackLifecycle for NoopPlaybackLifecycle {
    async fn begin_background_execution(&self) -> Result<()> {
        Ok(())
    }

    async fn end_background_execution(&self) -> Result<()> {
        Ok(())
    }

    async fn activate_audio_session(&self) -> Result<()> {
        Ok(())
    }

    async fn deactivate_audio_session(&self) -> Result<()> {
        Ok(())
    }
}
