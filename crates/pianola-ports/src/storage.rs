use crate::playback::VisibleHands;
use crate::types::*;
use serde::{Deserialize, Serialize};

fn default_monitor_enabled() -> bool {
    true
}

fn default_metronome_enabled() -> bool {
    true
}

fn default_playback_speed() -> f64 {
    1.0
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    pub selected_midi_in: Option<DeviceId>,
    #[serde(default = "default_monitor_enabled")]
    pub monitor_enabled: bool,
    #[serde(default = "default_metronome_enabled")]
    pub metronome_enabled: bool,
    #[serde(default = "default_playback_speed")]
    pub playback_speed: f64,
    pub visible_hands: VisibleHands,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            selected_midi_in: None,
            monitor_enabled: true,
            metronome_enabled: true,
            playback_speed: 1.0,
            visible_hands: VisibleHands::BOTH,
        }
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}
