use pianola_ports::playback::Click;
use pianola_ports::types::Seconds;

/// A click reached more than this late is skipped silently.
pub const LATE_CLICK_TOLERANCE_SECS: Seconds = 0.1;
pub const BEATS_PER_BAR: i64 = 4;

#[derive(Clone, Debug)]
pub struct Metronome {
    next_click_time: Seconds,
    enabled: bool,
}

impl Metronome {
    pub fn new(enabled: bool) -> Self {
        Self {
            next_click_time: 0.0,
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn next_click_time(&self) -> Seconds {
        self.next_click_time
    }

    /// Aligns the next click with the start of the countdown.
    pub fn rewind_to(&mut self, time: Seconds) {
        self.next_click_time = time;
    }

    pub fn reset(&mut self) {
        self.next_click_time = 0.0;
    }

    /// Called once per tick with the song's seconds per beat. Advances by at
    /// most one beat; the countdown clicks even while the metronome is off.
    pub fn poll(&mut self, now: Seconds, beat: Seconds) -> Option<Click> {
        if !(self.enabled || now < 0.0) || now < self.next_click_time {
            return None;
        }

        let mut click = None;
        if now - self.next_click_time < LATE_CLICK_TOLERANCE_SECS {
            let beat_index = (self.next_click_time / beat).round() as i64;
            click = Some(Click {
                beat_index,
                is_downbeat: beat_index.rem_euclid(BEATS_PER_BAR) == 0,
            });
        }
        self.next_click_time += beat;
        click
    }
}
