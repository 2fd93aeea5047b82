//! Desktop playback lifecycle.
//!
//! Desktop processes keep running when unfocused and share the audio device
//! freely, so the toggles only record and log the requested state.

use async_trait::async_trait;
use bridge_traits::{error::Result, lifecycle::PlaybackLifecycle};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
pub struct DesktopPlaybackLifecycle {
    background: AtomicBool,
    audio_session: AtomicBool,
}

impl DesktopPlaybackLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_background_execution_active(&self) -> bool {
        self.background.load(Ordering::SeqCst)
    }

    pub fn is_audio_session_active(&self) -> bool {
        self.audio_session.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaybackLifecycle for DesktopPlaybackLifecycle {
    async fn begin_background_execution(&self) -> Result<()> {
        self.background.store(true, Ordering::SeqCst);
        debug!("Background execution requested");
        Ok(())
    }

    async fn end_background_execution(&self) -> Result<()> {
        self.background.store(false, Ordering::SeqCst);
        debug!("Background execution released");
        Ok(())
    }

    async fn activate_audio_session(&self) -> Result<()> {
        self.audio_session.store(true, Ordering::SeqCst);
        debug!("Audio session activated");
        Ok(())
    }

    async fn deactivate_audio_session(&self) -> Result<()> {
        self.audio_session.store(false, Ordering::SeqCst);
        debug!("Audio session deactivated");
        Ok(())
    }
}
