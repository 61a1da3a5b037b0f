use pianola_ports::types::Seconds;
use serde::{Deserialize, Serialize};

/// Beats of count-in before the first note.
pub const COUNTDOWN_BEATS: f64 = 16.0;
pub const MIN_PLAYBACK_SPEED: f64 = 0.1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Song clock. Time runs negative during the countdown and reaches zero
/// when the first note is due.
#[derive(Clone, Debug)]
pub struct TransportClock {
    state: TransportState,
    current_time: Seconds,
    playback_speed: f64,
}

impl TransportClock {
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            current_time: 0.0,
            playback_speed: 1.0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn current_time(&self) -> Seconds {
        self.current_time
    }

    pub fn playback_speed(&self) -> f64 {
        self.playback_speed
    }

    /// Starts or resumes. Returns the countdown start when playback begins
    /// from the top, so the metronome can be aligned to it.
    pub fn play(&mut self, bpm: f64) -> Option<Seconds> {
        let mut countdown = None;
        if !self.is_playing() && self.current_time == 0.0 {
            let start = -(60.0 / bpm) * COUNTDOWN_BEATS;
            self.current_time = start;
            countdown = Some(start);
        }
        self.state = TransportState::Playing;
        countdown
    }

    pub fn pause(&mut self) {
        self.state = TransportState::Paused;
    }

    pub fn reset(&mut self) {
        self.state = TransportState::Stopped;
        self.current_time = 0.0;
    }

    /// Moves the clock by a wall-clock delta scaled by the playback speed.
    /// Returns the new time, or `None` while not playing.
    pub fn advance(&mut self, delta: Seconds) -> Option<Seconds> {
        if !self.is_playing() {
            return None;
        }
        let delta = if delta.is_finite() && delta > 0.0 {
            delta
        } else {
            0.0
        };
        self.current_time += delta * self.playback_speed;
        Some(self.current_time)
    }

    pub fn set_playback_speed(&mut self, speed: f64) {
        if !speed.is_finite() {
            return;
        }
        self.playback_speed = speed.max(MIN_PLAYBACK_SPEED);
    }
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new()
    }
}
