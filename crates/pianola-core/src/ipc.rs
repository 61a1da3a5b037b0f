use pianola_domain_eval::Grade;
use pianola_domain_score::KeySignature;
use pianola_ports::midi::MidiLikeEvent;
use pianola_ports::playback::{Click, ReferenceNote};
use pianola_ports::storage::SettingsDto;
use pianola_ports::types::{DeviceId, MidiInputDevice, Seconds};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SongSource {
    MidiFile(String),
    Demo { seed: u64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    LoadSong { source: SongSource },
    Play,
    Pause,
    Reset,
    SetPlaybackSpeed { x: f64 },
    SetVisibleHands { left: bool, right: bool },
    SetMetronomeEnabled { enabled: bool },
    SetMonitorEnabled { enabled: bool },
    ListMidiInputs,
    SelectMidiInput { device_id: DeviceId },
    ExportDiagnostics { path: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Ready,
    Running,
    Paused,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    SongLoaded {
        name: String,
        bpm: f64,
        key_signature: Option<KeySignature>,
        note_count: usize,
        duration: Seconds,
    },
    SessionStateUpdated { state: SessionState, settings: SettingsDto },
    TransportUpdated {
        current_time: Seconds,
        playing: bool,
        playback_speed: f64,
        cursor: usize,
    },
    ReferenceNote { note: ReferenceNote },
    MetronomeClick { click: Click },
    JudgeFeedback {
        pitch: u8,
        grade: Grade,
        note_index: Option<usize>,
        points: u64,
    },
    ScoreUpdated {
        score: u64,
        combo: u32,
        max_combo: u32,
        accuracy: f32,
    },
    MidiInputsUpdated { devices: Vec<MidiInputDevice> },
    MidiUnavailable { reason: String },
    RecentInputEvents { events: Vec<MidiLikeEvent> },
}
