// Audio module - Cue playback through external players
pub mod player;

pub use player::ProcessAudioPlayer;

use crate::core::audio::{SharedAudio, SilentAudio};
use crate::domain::config::ModemConfig;
use std::sync::Arc;

/// Build the audio collaborator described by the configuration
pub fn audio_from_config(config: &ModemConfig) -> SharedAudio {
    if config.audio.enabled {
        Arc::new(ProcessAudioPlayer::new(&config.audio, config.sounds.clone()))
    } else {
        Arc::new(SilentAudio)
    }
}
