use parking_lot::Mutex;
use pianola_core::{AppCore, AppError, Command, Event, MidiStatus, SessionState, SongSource};
use pianola_domain_eval::Grade;
use pianola_ports::audio::AudioCuePort;
use pianola_ports::midi::{
    MidiError, MidiInputPort, MidiInputStream, MidiLikeEvent, PlayerEvent, PlayerEventCallback,
};
use pianola_ports::playback::{ReferenceNote, VisibleHands};
use pianola_ports::storage::{SettingsDto, StorageError, StoragePort};
use pianola_ports::types::{DeviceId, MidiInputDevice, Velocity01};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Debug, PartialEq)]
enum Cue {
    Monitor(u8),
    Reference(u8),
    Stop(u8),
    Click(bool),
}

#[derive(Default)]
struct RecordingAudio {
    cues: Mutex<Vec<Cue>>,
}

impl RecordingAudio {
    fn cues(&self) -> Vec<Cue> {
        self.cues.lock().clone()
    }
}

impl AudioCuePort for RecordingAudio {
    fn play_note(&self, pitch: u8, _velocity: Velocity01) {
        self.cues.lock().push(Cue::Monitor(pitch));
    }

    fn play_reference_note(&self, note: &ReferenceNote) {
        self.cues.lock().push(Cue::Reference(note.pitch));
    }

    fn stop_note(&self, pitch: u8) {
        self.cues.lock().push(Cue::Stop(pitch));
    }

    fn play_click(&self, is_downbeat: bool) {
        self.cues.lock().push(Cue::Click(is_downbeat));
    }
}

struct FakeStream;

impl MidiInputStream for FakeStream {
    fn close(self: Box<Self>) {}
}

/// Hands the registered callback back to the test so it can play notes.
#[derive(Clone, Default)]
struct FakeMidi {
    unsupported: Option<String>,
    callback: Arc<Mutex<Option<PlayerEventCallback>>>,
}

impl FakeMidi {
    fn press(&self, event: MidiLikeEvent) {
        let cb = self.callback.lock().clone().expect("input opened");
        cb(PlayerEvent {
            at: Instant::now(),
            event,
        });
    }
}

impl MidiInputPort for FakeMidi {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
        if let Some(reason) = &self.unsupported {
            return Err(MidiError::Unsupported(reason.clone()));
        }
        Ok(vec![MidiInputDevice {
            id: DeviceId("kbd".to_string()),
            name: "Keyboard".to_string(),
            is_available: true,
        }])
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: PlayerEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        if device_id.0 != "kbd" {
            return Err(MidiError::DeviceNotFound(device_id.0.clone()));
        }
        *self.callback.lock() = Some(cb);
        Ok(Box::new(FakeStream))
    }
}

#[derive(Clone, Default)]
struct MemoryStorage {
    initial: SettingsDto,
    saved: Arc<Mutex<Option<SettingsDto>>>,
}

impl StoragePort for MemoryStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        Ok(self.initial.clone())
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        *self.saved.lock() = Some(s.clone());
        Ok(())
    }
}

struct Harness {
    app: AppCore,
    midi: FakeMidi,
    audio: Arc<RecordingAudio>,
    storage: MemoryStorage,
}

fn harness_with(midi: FakeMidi, storage: MemoryStorage) -> Harness {
    env_logger::try_init().unwrap_or(());
    let audio = Arc::new(RecordingAudio::default());
    let app = AppCore::new(
        Box::new(midi.clone()),
        audio.clone(),
        Some(Box::new(storage.clone())),
    );
    Harness {
        app,
        midi,
        audio,
        storage,
    }
}

fn harness() -> Harness {
    harness_with(FakeMidi::default(), MemoryStorage::default())
}

fn load_demo(h: &mut Harness) {
    h.app
        .handle_command(Command::LoadSong {
            source: SongSource::Demo { seed: 11 },
        })
        .expect("demo loads");
}

/// Ticks in half-beat frames until song time reaches `until`.
fn run_until(app: &mut AppCore, until: f64) {
    while app.game().current_time() < until {
        app.tick(0.5);
    }
}

#[test]
fn loading_demo_announces_song_and_ready_state() {
    let mut h = harness();
    load_demo(&mut h);

    let events = h.app.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::SongLoaded { note_count: 50, name, .. } if name == "Practice #11"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::SessionStateUpdated {
            state: SessionState::Ready,
            ..
        }
    )));
    assert_eq!(h.app.session_state(), SessionState::Ready);
}

#[test]
fn idle_until_a_song_is_loaded() {
    let h = harness();
    assert_eq!(h.app.session_state(), SessionState::Idle);
}

#[test]
fn clicks_and_reference_notes_reach_audio_and_event_queue() {
    let mut h = harness();
    load_demo(&mut h);
    h.app.handle_command(Command::Play).expect("play");
    assert_eq!(h.app.session_state(), SessionState::Running);

    h.app.tick(0.0);
    assert_eq!(h.audio.cues(), vec![Cue::Click(true)]);

    run_until(&mut h.app, 2.0);
    let first = h.app.game().song().notes()[0].pitch;
    assert!(h.audio.cues().contains(&Cue::Reference(first)));

    let events = h.app.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::MetronomeClick { click } if click.beat_index == -16)));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ReferenceNote { note } if note.pitch == first)));
}

#[test]
fn key_presses_are_monitored_and_judged() {
    let mut h = harness();
    h.app
        .handle_command(Command::SelectMidiInput {
            device_id: DeviceId("kbd".to_string()),
        })
        .expect("open input");
    load_demo(&mut h);
    h.app.handle_command(Command::Play).expect("play");
    run_until(&mut h.app, 2.0);
    h.app.drain_events();

    let pitch = h.app.game().song().notes()[0].pitch;
    h.midi.press(MidiLikeEvent::NoteOn {
        note: pitch,
        velocity: 100,
    });
    h.midi.press(MidiLikeEvent::NoteOff { note: pitch });
    h.app.tick(0.0);

    let cues = h.audio.cues();
    assert!(cues.contains(&Cue::Monitor(pitch)));
    assert!(cues.contains(&Cue::Stop(pitch)));

    let events = h.app.drain_events();
    assert!(events.contains(&Event::JudgeFeedback {
        pitch,
        grade: Grade::Perfect,
        note_index: Some(0),
        points: 100,
    }));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::ScoreUpdated {
            score: 100,
            combo: 1,
            ..
        }
    )));
    assert!(h.app.game().song().notes()[0].hit);
}

#[test]
fn monitor_off_still_judges() {
    let mut h = harness();
    h.app
        .handle_command(Command::SelectMidiInput {
            device_id: DeviceId("kbd".to_string()),
        })
        .expect("open input");
    h.app
        .handle_command(Command::SetMonitorEnabled { enabled: false })
        .expect("monitor off");
    load_demo(&mut h);
    h.app.handle_command(Command::Play).expect("play");
    run_until(&mut h.app, 2.0);

    h.midi.press(MidiLikeEvent::NoteOn {
        note: 127,
        velocity: 64,
    });
    h.app.tick(0.0);

    assert!(!h.audio.cues().contains(&Cue::Monitor(127)));
    assert!(h.app.drain_events().iter().any(|e| matches!(
        e,
        Event::JudgeFeedback {
            grade: Grade::Miss,
            ..
        }
    )));
}

#[test]
fn presses_while_stopped_are_not_judged() {
    let mut h = harness();
    h.app
        .handle_command(Command::SelectMidiInput {
            device_id: DeviceId("kbd".to_string()),
        })
        .expect("open input");
    load_demo(&mut h);
    h.app.drain_events();

    h.midi.press(MidiLikeEvent::NoteOn {
        note: 60,
        velocity: 90,
    });
    h.app.tick(0.1);

    assert!(h.audio.cues().contains(&Cue::Monitor(60)));
    assert!(!h
        .app
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::JudgeFeedback { .. })));
}

#[test]
fn missing_midi_capability_is_a_status_not_an_error() {
    let midi = FakeMidi {
        unsupported: Some("no backend".to_string()),
        ..FakeMidi::default()
    };
    let mut h = harness_with(midi, MemoryStorage::default());

    assert_eq!(
        h.app.midi_status(),
        &MidiStatus::Unavailable("no backend".to_string())
    );
    let unavailable = Event::MidiUnavailable {
        reason: "no backend".to_string(),
    };
    assert_eq!(h.app.drain_events(), vec![unavailable.clone()]);

    load_demo(&mut h);
    h.app.handle_command(Command::Play).expect("play");
    h.app.tick(0.5);

    h.app
        .handle_command(Command::ListMidiInputs)
        .expect("listing reports status");
    assert!(h.app.drain_events().contains(&unavailable));

    let selected = h.app.handle_command(Command::SelectMidiInput {
        device_id: DeviceId("kbd".to_string()),
    });
    assert!(matches!(selected, Err(AppError::Midi(MidiError::Unsupported(_)))));
}

#[test]
fn unknown_device_is_an_error() {
    let mut h = harness();
    let result = h.app.handle_command(Command::SelectMidiInput {
        device_id: DeviceId("nope".to_string()),
    });
    assert!(matches!(result, Err(AppError::Midi(MidiError::DeviceNotFound(_)))));
    assert_eq!(h.app.midi_status(), &MidiStatus::Available);
}

#[test]
fn list_inputs_reports_devices() {
    let mut h = harness();
    h.app.handle_command(Command::ListMidiInputs).expect("list");
    let events = h.app.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::MidiInputsUpdated { devices } if devices.len() == 1)));
}

#[test]
fn stored_settings_are_applied_and_changes_saved() {
    let storage = MemoryStorage {
        initial: SettingsDto {
            playback_speed: 0.5,
            metronome_enabled: false,
            visible_hands: VisibleHands {
                left: false,
                right: true,
            },
            ..SettingsDto::default()
        },
        ..MemoryStorage::default()
    };
    let mut h = harness_with(FakeMidi::default(), storage);

    assert_eq!(h.app.game().playback_speed(), 0.5);
    assert!(!h.app.game().metronome_enabled());
    assert!(!h.app.game().visible_hands().left);

    h.app
        .handle_command(Command::SetPlaybackSpeed { x: 0.01 })
        .expect("speed");
    h.app
        .handle_command(Command::SetVisibleHands {
            left: true,
            right: false,
        })
        .expect("hands");

    let saved = h.storage.saved.lock().clone().expect("settings saved");
    assert_eq!(saved.playback_speed, 0.1);
    assert_eq!(
        saved.visible_hands,
        VisibleHands {
            left: true,
            right: false
        }
    );
    assert!(!saved.metronome_enabled);
}

#[test]
fn saved_midi_input_is_reopened_on_startup() {
    let storage = MemoryStorage {
        initial: SettingsDto {
            selected_midi_in: Some(DeviceId("kbd".to_string())),
            ..SettingsDto::default()
        },
        ..MemoryStorage::default()
    };
    let h = harness_with(FakeMidi::default(), storage);
    assert!(h.midi.callback.lock().is_some());
}

#[test]
fn first_listed_input_is_opened_when_none_saved() {
    let h = harness();
    assert!(h.midi.callback.lock().is_some());
    assert_eq!(
        h.app.settings().selected_midi_in,
        Some(DeviceId("kbd".to_string()))
    );
}

#[test]
fn auto_selected_input_is_judged_without_explicit_selection() {
    let mut h = harness();
    load_demo(&mut h);
    h.app.handle_command(Command::Play).expect("play");
    run_until(&mut h.app, 2.0);

    let pitch = h.app.game().song().notes()[0].pitch;
    h.midi.press(MidiLikeEvent::NoteOn {
        note: pitch,
        velocity: 100,
    });
    h.app.tick(0.0);
    assert_eq!(h.app.game().score(), 100);
}

#[test]
fn reset_clears_score_and_rewinds() {
    let mut h = harness();
    h.app
        .handle_command(Command::SelectMidiInput {
            device_id: DeviceId("kbd".to_string()),
        })
        .expect("open input");
    load_demo(&mut h);
    h.app.handle_command(Command::Play).expect("play");
    run_until(&mut h.app, 2.0);
    let pitch = h.app.game().song().notes()[0].pitch;
    h.midi.press(MidiLikeEvent::NoteOn {
        note: pitch,
        velocity: 100,
    });
    h.app.tick(0.0);
    assert_eq!(h.app.game().score(), 100);

    h.app.handle_command(Command::Reset).expect("reset");
    assert_eq!(h.app.game().score(), 0);
    assert_eq!(h.app.game().current_time(), 0.0);
    assert_eq!(h.app.game().song().hit_count(), 0);
    assert_eq!(h.app.session_state(), SessionState::Ready);
}

#[test]
fn missing_midi_file_fails_to_load() {
    let mut h = harness();
    let result = h.app.handle_command(Command::LoadSong {
        source: SongSource::MidiFile("/definitely/not/here.mid".to_string()),
    });
    assert!(matches!(result, Err(AppError::ScoreLoad(_))));
    assert_eq!(h.app.session_state(), SessionState::Idle);
}

#[test]
fn diagnostics_bundle_is_written() {
    let mut h = harness();
    load_demo(&mut h);
    let dir = std::env::temp_dir().join(format!("pianola-diag-{}", std::process::id()));

    h.app
        .handle_command(Command::ExportDiagnostics {
            path: dir.to_string_lossy().into_owned(),
        })
        .expect("export");

    for file in [
        "settings.json",
        "device_snapshot.json",
        "recent_events.json",
        "session.json",
    ] {
        assert!(dir.join(file).exists(), "{} missing", file);
    }
    let session: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.join("session.json")).expect("read"))
            .expect("json");
    assert_eq!(session["note_count"], 50);
    std::fs::remove_dir_all(&dir).ok();
}
