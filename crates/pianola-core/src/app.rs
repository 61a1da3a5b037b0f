use crate::diagnostics::{export_diagnostics, DiagnosticsBundle, SessionSnapshot};
use crate::game::Game;
use crate::ipc::{Command, Event, SessionState, SongSource};
use crate::listeners::{EngineEvent, EventKind};
use crate::transport::TransportState;
use log::{debug, info, warn};
use parking_lot::Mutex;
use pianola_domain_score::{generate_practice_song, import_midi_path, MidiImportError, Song};
use pianola_ports::audio::AudioCuePort;
use pianola_ports::midi::{MidiError, MidiInputPort, MidiInputStream, MidiLikeEvent, PlayerEvent};
use pianola_ports::playback::VisibleHands;
use pianola_ports::storage::{SettingsDto, StorageError, StoragePort};
use pianola_ports::types::{DeviceId, Seconds, Velocity01};
use rtrb::{Consumer, RingBuffer};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

const MIDI_QUEUE_CAPACITY: usize = 2048;
const RECENT_INPUT_LIMIT: usize = 20;
const TRANSPORT_EMIT_INTERVAL: Duration = Duration::from_millis(33);
const INPUT_EMIT_INTERVAL: Duration = Duration::from_millis(50);

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("midi error: {0}")]
    Midi(#[from] MidiError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("score load failed: {0}")]
    ScoreLoad(#[from] MidiImportError),
}

/// Whether the host can take MIDI input at all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiStatus {
    Available,
    Unavailable(String),
}

pub struct AppCore {
    midi_port: Box<dyn MidiInputPort>,
    audio: Arc<dyn AudioCuePort>,
    storage: Option<Box<dyn StoragePort>>,
    settings: SettingsDto,
    game: Game,
    song_loaded: bool,
    midi_status: MidiStatus,
    midi_stream: Option<Box<dyn MidiInputStream>>,
    midi_queue_rx: Option<Consumer<PlayerEvent>>,
    events: VecDeque<Event>,
    recent_inputs: VecDeque<MidiLikeEvent>,
    last_transport_emit: Instant,
    last_input_emit: Instant,
}

impl AppCore {
    pub fn new(
        midi_port: Box<dyn MidiInputPort>,
        audio: Arc<dyn AudioCuePort>,
        storage: Option<Box<dyn StoragePort>>,
    ) -> Self {
        let settings = match storage.as_ref().map(|s| s.load_settings()) {
            Some(Ok(settings)) => settings,
            Some(Err(e)) => {
                warn!("failed to load settings, using defaults: {}", e);
                SettingsDto::default()
            }
            None => SettingsDto::default(),
        };

        let mut game = Game::new();
        game.set_playback_speed(settings.playback_speed);
        game.set_visible_hands(settings.visible_hands);
        game.set_metronome_enabled(settings.metronome_enabled);

        let reference_audio = audio.clone();
        game.on(
            EventKind::ReferenceNote,
            Box::new(move |event: &EngineEvent| {
                if let EngineEvent::ReferenceNote(note) = event {
                    reference_audio.play_reference_note(note);
                }
            }),
        );
        let click_audio = audio.clone();
        game.on(
            EventKind::Click,
            Box::new(move |event: &EngineEvent| {
                if let EngineEvent::Click(click) = event {
                    click_audio.play_click(click.is_downbeat);
                }
            }),
        );

        let mut core = Self {
            midi_port,
            audio,
            storage,
            settings,
            game,
            song_loaded: false,
            midi_status: MidiStatus::Available,
            midi_stream: None,
            midi_queue_rx: None,
            events: VecDeque::new(),
            recent_inputs: VecDeque::with_capacity(RECENT_INPUT_LIMIT),
            last_transport_emit: Instant::now(),
            last_input_emit: Instant::now(),
        };
        core.probe_midi();
        core.reopen_saved_input();
        core
    }

    pub fn handle_command(&mut self, cmd: Command) -> Result<(), AppError> {
        match cmd {
            Command::LoadSong { source } => {
                self.load_song(source)?;
            }
            Command::Play => {
                self.game.play();
                self.emit_session_state();
                self.emit_transport(true);
            }
            Command::Pause => {
                self.game.pause();
                self.emit_session_state();
                self.emit_transport(true);
            }
            Command::Reset => {
                self.game.reset();
                self.emit_session_state();
                self.emit_transport(true);
                self.emit_score();
            }
            Command::SetPlaybackSpeed { x } => {
                self.game.set_playback_speed(x);
                self.settings.playback_speed = self.game.playback_speed();
                self.emit_session_state();
                self.emit_transport(true);
                self.save_settings();
            }
            Command::SetVisibleHands { left, right } => {
                let visible = VisibleHands { left, right };
                self.game.set_visible_hands(visible);
                self.settings.visible_hands = visible;
                self.emit_session_state();
                self.save_settings();
            }
            Command::SetMetronomeEnabled { enabled } => {
                self.game.set_metronome_enabled(enabled);
                self.settings.metronome_enabled = enabled;
                self.emit_session_state();
                self.save_settings();
            }
            Command::SetMonitorEnabled { enabled } => {
                self.settings.monitor_enabled = enabled;
                self.emit_session_state();
                self.save_settings();
            }
            Command::ListMidiInputs => {
                if let MidiStatus::Unavailable(reason) = &self.midi_status {
                    self.events.push_back(Event::MidiUnavailable {
                        reason: reason.clone(),
                    });
                    return Ok(());
                }
                let devices = self.midi_port.list_inputs()?;
                self.events.push_back(Event::MidiInputsUpdated { devices });
            }
            Command::SelectMidiInput { device_id } => {
                if let MidiStatus::Unavailable(reason) = &self.midi_status {
                    return Err(MidiError::Unsupported(reason.clone()).into());
                }
                self.open_midi_input(device_id)?;
            }
            Command::ExportDiagnostics { path } => {
                let midi_inputs = match self.midi_status {
                    MidiStatus::Available => self.midi_port.list_inputs()?,
                    MidiStatus::Unavailable(_) => Vec::new(),
                };
                export_diagnostics(
                    Path::new(&path),
                    DiagnosticsBundle {
                        settings: &self.settings,
                        midi_status: &self.midi_status,
                        midi_inputs,
                        recent_events: self.recent_inputs.iter().copied().collect(),
                        session: self.session_snapshot(),
                    },
                )?;
                info!("diagnostics written to {}", path);
            }
        }
        Ok(())
    }

    /// One frame: drain MIDI input, advance the game, queue what fired.
    pub fn tick(&mut self, delta: Seconds) {
        self.process_midi_inputs();
        for fired in self.game.tick(delta) {
            let event = match fired {
                EngineEvent::ReferenceNote(note) => Event::ReferenceNote { note },
                EngineEvent::Click(click) => Event::MetronomeClick { click },
            };
            self.events.push_back(event);
        }
        self.emit_transport(false);
        self.emit_recent_inputs();
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn settings(&self) -> &SettingsDto {
        &self.settings
    }

    pub fn midi_status(&self) -> &MidiStatus {
        &self.midi_status
    }

    pub fn session_state(&self) -> SessionState {
        match self.game.state() {
            TransportState::Playing => SessionState::Running,
            TransportState::Paused => SessionState::Paused,
            TransportState::Stopped if self.song_loaded => SessionState::Ready,
            TransportState::Stopped => SessionState::Idle,
        }
    }

    fn probe_midi(&mut self) {
        match self.midi_port.list_inputs() {
            Ok(devices) => {
                debug!("{} midi input(s) found", devices.len());
                self.midi_status = MidiStatus::Available;
            }
            Err(MidiError::Unsupported(reason)) => self.mark_midi_unavailable(reason),
            Err(e) => warn!("midi probe failed: {}", e),
        }
    }

    fn mark_midi_unavailable(&mut self, reason: String) {
        warn!("midi input unavailable: {}", reason);
        self.midi_status = MidiStatus::Unavailable(reason.clone());
        self.events.push_back(Event::MidiUnavailable { reason });
    }

    /// Reopens the saved input, or picks the first listed one on a fresh setup.
    fn reopen_saved_input(&mut self) {
        if self.midi_status != MidiStatus::Available {
            return;
        }
        let device_id = match self.settings.selected_midi_in.clone() {
            Some(device_id) => device_id,
            None => match self.midi_port.list_inputs() {
                Ok(devices) => match devices.into_iter().next() {
                    Some(device) => {
                        info!("no midi input selected, using '{}'", device.name);
                        device.id
                    }
                    None => return,
                },
                Err(e) => {
                    warn!("midi inputs could not be listed: {}", e);
                    return;
                }
            },
        };
        if let Err(e) = self.open_midi_input(device_id.clone()) {
            warn!("could not open midi input {}: {}", device_id, e);
        }
    }

    fn open_midi_input(&mut self, device_id: DeviceId) -> Result<(), AppError> {
        if let Some(stream) = self.midi_stream.take() {
            stream.close();
        }

        let (producer, consumer) = RingBuffer::new(MIDI_QUEUE_CAPACITY);
        let producer = Arc::new(Mutex::new(producer));
        let cb = Arc::new(move |event: PlayerEvent| {
            if let Some(mut guard) = producer.try_lock() {
                let _ = guard.push(event);
            }
        });

        let stream = match self.midi_port.open_input(&device_id, cb) {
            Ok(stream) => stream,
            Err(MidiError::Unsupported(reason)) => {
                self.mark_midi_unavailable(reason.clone());
                return Err(MidiError::Unsupported(reason).into());
            }
            Err(e) => return Err(e.into()),
        };
        info!("listening on midi input {}", device_id);
        self.midi_stream = Some(stream);
        self.midi_queue_rx = Some(consumer);
        self.settings.selected_midi_in = Some(device_id);
        self.emit_session_state();
        self.save_settings();
        Ok(())
    }

    fn load_song(&mut self, source: SongSource) -> Result<(), AppError> {
        let song = match source {
            SongSource::MidiFile(path) => import_midi_path(Path::new(&path))?,
            SongSource::Demo { seed } => generate_practice_song(seed),
        };
        self.apply_song(song);
        Ok(())
    }

    fn apply_song(&mut self, song: Song) {
        self.events.push_back(Event::SongLoaded {
            name: song.name.clone(),
            bpm: song.bpm,
            key_signature: song.key_signature.clone(),
            note_count: song.len(),
            duration: song.duration,
        });
        self.game.load_song(song);
        self.song_loaded = true;
        self.emit_session_state();
        self.emit_transport(true);
        self.emit_score();
    }

    fn process_midi_inputs(&mut self) {
        let Some(mut consumer) = self.midi_queue_rx.take() else {
            return;
        };
        let mut pending = Vec::new();
        while let Ok(event) = consumer.pop() {
            pending.push(event);
        }
        self.midi_queue_rx = Some(consumer);

        for event in pending {
            self.record_recent_input(event.event);
            self.route_player_event(event.event);
        }
    }

    fn route_player_event(&mut self, event: MidiLikeEvent) {
        match event {
            MidiLikeEvent::NoteOn { note, velocity } => {
                if self.settings.monitor_enabled {
                    self.audio.play_note(note, Velocity01::from_midi(velocity));
                }
                if let Some(judgement) = self.game.judge_note_on(note) {
                    self.events.push_back(Event::JudgeFeedback {
                        pitch: note,
                        grade: judgement.grade,
                        note_index: judgement.note_index,
                        points: judgement.points,
                    });
                    self.emit_score();
                }
            }
            MidiLikeEvent::NoteOff { note } => {
                self.audio.stop_note(note);
            }
        }
    }

    fn record_recent_input(&mut self, event: MidiLikeEvent) {
        if self.recent_inputs.len() >= RECENT_INPUT_LIMIT {
            self.recent_inputs.pop_front();
        }
        self.recent_inputs.push_back(event);
    }

    fn emit_recent_inputs(&mut self) {
        if self.last_input_emit.elapsed() < INPUT_EMIT_INTERVAL {
            return;
        }
        if !self.recent_inputs.is_empty() {
            self.events.push_back(Event::RecentInputEvents {
                events: self.recent_inputs.iter().copied().collect(),
            });
        }
        self.last_input_emit = Instant::now();
    }

    fn emit_session_state(&mut self) {
        self.events.push_back(Event::SessionStateUpdated {
            state: self.session_state(),
            settings: self.settings.clone(),
        });
    }

    fn emit_score(&mut self) {
        let stats = self.game.stats();
        self.events.push_back(Event::ScoreUpdated {
            score: stats.score,
            combo: stats.combo,
            max_combo: stats.max_combo,
            accuracy: stats.accuracy(),
        });
    }

    fn emit_transport(&mut self, force: bool) {
        let now = Instant::now();
        if !force && now.duration_since(self.last_transport_emit) < TRANSPORT_EMIT_INTERVAL {
            return;
        }
        self.events.push_back(Event::TransportUpdated {
            current_time: self.game.current_time(),
            playing: self.game.is_playing(),
            playback_speed: self.game.playback_speed(),
            cursor: self.game.cursor(),
        });
        self.last_transport_emit = now;
    }

    fn session_snapshot(&self) -> SessionSnapshot {
        let song = self.game.song();
        SessionSnapshot {
            song_name: song.name.clone(),
            note_count: song.len(),
            notes_hit: song.hit_count(),
            current_time: self.game.current_time(),
            playing: self.game.is_playing(),
            stats: self.game.stats(),
        }
    }

    fn save_settings(&self) {
        if let Some(storage) = self.storage.as_ref() {
            if let Err(e) = storage.save_settings(&self.settings) {
                warn!("failed to save settings: {}", e);
            }
        }
    }
}
