use crate::app::MidiStatus;
use pianola_domain_eval::ScoreStats;
use pianola_ports::midi::MidiLikeEvent;
use pianola_ports::storage::{SettingsDto, StorageError};
use pianola_ports::types::{MidiInputDevice, Seconds};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Serialize)]
struct DeviceSnapshot<'a> {
    midi_status: &'a MidiStatus,
    midi_inputs: Vec<MidiInputDevice>,
}

#[derive(Serialize)]
struct RecentEvents {
    events: Vec<MidiLikeEvent>,
}

/// What the session looked like when the bundle was written.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub song_name: String,
    pub note_count: usize,
    pub notes_hit: usize,
    pub current_time: Seconds,
    pub playing: bool,
    pub stats: ScoreStats,
}

pub struct DiagnosticsBundle<'a> {
    pub settings: &'a SettingsDto,
    pub midi_status: &'a MidiStatus,
    pub midi_inputs: Vec<MidiInputDevice>,
    pub recent_events: Vec<MidiLikeEvent>,
    pub session: SessionSnapshot,
}

/// Writes one pretty JSON file per section into `dir`, creating it if needed.
pub fn export_diagnostics(dir: &Path, bundle: DiagnosticsBundle<'_>) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(|e| StorageError::Io(e.to_string()))?;

    write_json(&dir.join("settings.json"), bundle.settings)?;
    write_json(
        &dir.join("device_snapshot.json"),
        &DeviceSnapshot {
            midi_status: bundle.midi_status,
            midi_inputs: bundle.midi_inputs,
        },
    )?;
    write_json(
        &dir.join("recent_events.json"),
        &RecentEvents {
            events: bundle.recent_events,
        },
    )?;
    write_json(&dir.join("session.json"), &bundle.session)?;

    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let data = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
    fs::write(path, data).map_err(|e| StorageError::Io(e.to_string()))
}
