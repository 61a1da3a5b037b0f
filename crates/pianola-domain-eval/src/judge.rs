use pianola_domain_score::Song;
use pianola_ports::playback::VisibleHands;
use pianola_ports::types::Seconds;
use serde::{Deserialize, Serialize};

pub const HIT_WINDOW_SECS: Seconds = 0.15;
/// Absorbs float error so a press exactly on the window edge still counts.
const WINDOW_SLACK_SECS: Seconds = 1e-9;

pub const BASE_HIT_POINTS: u64 = 100;
pub const COMBO_BONUS_POINTS: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    Perfect,
    Miss,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgement {
    pub grade: Grade,
    /// Index into the song's notes of the note that was matched.
    pub note_index: Option<usize>,
    pub points: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub hits: u32,
    pub misses: u32,
}

impl ScoreStats {
    pub fn accuracy(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

/// Matches performer note-ons against the song.
///
/// Every press scans the whole song rather than following a cursor: chord
/// tones share a window and may be struck in any order.
#[derive(Clone, Debug)]
pub struct Judge {
    stats: ScoreStats,
}

impl Judge {
    pub fn new() -> Self {
        Self {
            stats: ScoreStats::default(),
        }
    }

    pub fn stats(&self) -> ScoreStats {
        self.stats
    }

    pub fn score(&self) -> u64 {
        self.stats.score
    }

    pub fn combo(&self) -> u32 {
        self.stats.combo
    }

    pub fn reset(&mut self) {
        self.stats = ScoreStats::default();
    }

    pub fn on_note_on(
        &mut self,
        song: &mut Song,
        pitch: u8,
        now: Seconds,
        visible: VisibleHands,
    ) -> Judgement {
        let limit = HIT_WINDOW_SECS + WINDOW_SLACK_SECS;
        let found = song.notes().iter().position(|note| {
            visible.allows(note.hand)
                && note.pitch == pitch
                && (note.start_time - now).abs() <= limit
                && !note.hit
        });

        match found {
            Some(index) => {
                song.mark_hit(index);
                let points = BASE_HIT_POINTS + self.stats.combo as u64 * COMBO_BONUS_POINTS;
                self.stats.score += points;
                self.stats.combo += 1;
                self.stats.max_combo = self.stats.max_combo.max(self.stats.combo);
                self.stats.hits += 1;
                Judgement {
                    grade: Grade::Perfect,
                    note_index: Some(index),
                    points,
                }
            }
            None => {
                self.stats.combo = 0;
                self.stats.misses += 1;
                Judgement {
                    grade: Grade::Miss,
                    note_index: None,
                    points: 0,
                }
            }
        }
    }
}

impl Default for Judge {
    fn default() -> Self {
        Self::new()
    }
}
