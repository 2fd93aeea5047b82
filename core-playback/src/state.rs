//! Player state and the resource intents it drives.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Playback state. Exactly one value at a time, owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Idle with no current index. Initial state and the result of a reset.
    #[default]
    Ready,
    Playing,
    Paused,
    /// Waiting for the item at the current index to become available.
    Loading,
    /// The media engine rejected playback. Left only through `reset`.
    Failed,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Ready => "ready",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Loading => "loading",
            PlayerState::Failed => "failed",
        }
    }

    /// Whether background execution and the audio session should be held
    /// while in this state.
    pub fn holds_resources(&self) -> bool {
        !matches!(self, PlayerState::Ready | PlayerState::Failed)
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle call needed to bring the platform in line with the intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentToggle {
    BeginBackgroundExecution,
    EndBackgroundExecution,
    ActivateAudioSession,
    DeactivateAudioSession,
}

/// Background-execution and audio-session intents.
///
/// Toggles are edge triggered: asking for the value an intent already has
/// produces no lifecycle call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceIntents {
    background_execution: bool,
    audio_session: bool,
}

impl ResourceIntents {
    pub fn background_execution(&self) -> bool {
        self.background_execution
    }

    /// Stall and interruption signals are honored only while this is set.
    pub fn audio_session(&self) -> bool {
        self.audio_session
    }

    /// Sets both intents to `enabled`, returning the calls to make.
    pub fn set(&mut self, enabled: bool) -> Vec<IntentToggle> {
        let mut toggles = Vec::with_capacity(2);

        if self.background_execution != enabled {
            self.background_execution = enabled;
            toggles.push(if enabled {
                IntentToggle::BeginBackgroundExecution
            } else {
                IntentToggle::EndBackgroundExecution
            });
        }

        if self.audio_session != enabled {
            self.audio_session = enabled;
            toggles.push(if enabled {
                IntentToggle::ActivateAudioSession
            } else {
                IntentToggle::DeactivateAudioSession
            });
        }

        toggles
    }

    /// Intents for entering `state`.
    pub fn apply(&mut self, state: PlayerState) -> Vec<IntentToggle> {
        self.set(state.holds_resources())
    }
}
