use pianola_domain_score::Song;
use pianola_ports::playback::{ReferenceNote, VisibleHands};
use pianola_ports::types::Seconds;

/// Walks the song once, in order, emitting every note as it becomes due.
///
/// The cursor only moves forward; hidden-hand notes are stepped over rather
/// than deferred, so toggling a hand mid-song never replays anything.
#[derive(Clone, Debug, Default)]
pub struct ReferenceScheduler {
    cursor: usize,
}

impl ReferenceScheduler {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn schedule(&mut self, now: Seconds, song: &Song, visible: VisibleHands) -> Vec<ReferenceNote> {
        let mut due = Vec::new();
        if now < 0.0 {
            return due;
        }

        let notes = song.notes();
        while let Some(note) = notes.get(self.cursor) {
            if note.start_time > now {
                break;
            }
            if visible.allows(note.hand) {
                due.push(note.reference());
            }
            self.cursor += 1;
        }
        due
    }
}
