use crate::listeners::{EngineEvent, EventKind, Handler, ListenerId, Listeners};
use crate::metronome::Metronome;
use crate::scheduler::ReferenceScheduler;
use crate::transport::{TransportClock, TransportState};
use log::{debug, info};
use pianola_domain_eval::{Grade, Judge, Judgement, ScoreStats};
use pianola_domain_score::Song;
use pianola_ports::playback::VisibleHands;
use pianola_ports::types::Seconds;

/// Owns the song and every piece of session state. Hosts drive it with
/// `tick` and read it through the accessors.
#[derive(Debug)]
pub struct Game {
    song: Song,
    clock: TransportClock,
    metronome: Metronome,
    scheduler: ReferenceScheduler,
    judge: Judge,
    visible_hands: VisibleHands,
    listeners: Listeners,
}

impl Game {
    pub fn new() -> Self {
        Self {
            song: Song::empty(),
            clock: TransportClock::new(),
            metronome: Metronome::new(true),
            scheduler: ReferenceScheduler::new(),
            judge: Judge::new(),
            visible_hands: VisibleHands::BOTH,
            listeners: Listeners::new(),
        }
    }

    /// Replaces the song and resets the session. Speed, visibility, the
    /// metronome switch and listeners carry over.
    pub fn load_song(&mut self, song: Song) {
        info!("loaded '{}' ({} notes, {:.1} bpm)", song.name, song.len(), song.bpm);
        self.song = song;
        self.reset();
    }

    pub fn play(&mut self) {
        if let Some(countdown) = self.clock.play(self.song.bpm) {
            debug!("countdown from {:.3}s", countdown);
            self.metronome.rewind_to(countdown);
        }
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn reset(&mut self) {
        self.clock.reset();
        self.metronome.reset();
        self.scheduler.reset();
        self.judge.reset();
        self.song.clear_hits();
    }

    /// Advances the clock, then fires the metronome, then due reference
    /// notes. Returns what fired, in dispatch order.
    pub fn tick(&mut self, delta: Seconds) -> Vec<EngineEvent> {
        let Some(now) = self.clock.advance(delta) else {
            return Vec::new();
        };

        let mut fired = Vec::new();
        if let Some(click) = self.metronome.poll(now, self.song.beat_duration()) {
            fired.push(EngineEvent::Click(click));
        }
        for note in self.scheduler.schedule(now, &self.song, self.visible_hands) {
            fired.push(EngineEvent::ReferenceNote(note));
        }

        for event in &fired {
            self.listeners.emit(event);
        }
        fired
    }

    /// Judges a performer key press. `None` unless playing.
    pub fn check_hit(&mut self, pitch: u8) -> Option<Grade> {
        self.judge_note_on(pitch).map(|judgement| judgement.grade)
    }

    pub fn judge_note_on(&mut self, pitch: u8) -> Option<Judgement> {
        if !self.clock.is_playing() {
            return None;
        }
        let now = self.clock.current_time();
        Some(
            self.judge
                .on_note_on(&mut self.song, pitch, now, self.visible_hands),
        )
    }

    pub fn on(&mut self, kind: EventKind, handler: Handler) -> ListenerId {
        self.listeners.on(kind, handler)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    pub fn set_visible_hands(&mut self, visible: VisibleHands) {
        self.visible_hands = visible;
    }

    pub fn visible_hands(&self) -> VisibleHands {
        self.visible_hands
    }

    pub fn set_playback_speed(&mut self, speed: f64) {
        self.clock.set_playback_speed(speed);
    }

    pub fn playback_speed(&self) -> f64 {
        self.clock.playback_speed()
    }

    pub fn set_metronome_enabled(&mut self, enabled: bool) {
        self.metronome.set_enabled(enabled);
    }

    pub fn metronome_enabled(&self) -> bool {
        self.metronome.enabled()
    }

    pub fn next_click_time(&self) -> Seconds {
        self.metronome.next_click_time()
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn current_time(&self) -> Seconds {
        self.clock.current_time()
    }

    pub fn state(&self) -> TransportState {
        self.clock.state()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn cursor(&self) -> usize {
        self.scheduler.cursor()
    }

    pub fn score(&self) -> u64 {
        self.judge.score()
    }

    pub fn combo(&self) -> u32 {
        self.judge.combo()
    }

    pub fn stats(&self) -> ScoreStats {
        self.judge.stats()
    }

    /// True once every note has been passed by the scheduler.
    pub fn is_finished(&self) -> bool {
        self.clock.current_time() >= 0.0 && self.scheduler.cursor() >= self.song.len()
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
