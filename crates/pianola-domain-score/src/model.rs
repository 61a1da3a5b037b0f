pub use pianola_ports::playback::Hand;
use pianola_ports::playback::ReferenceNote;
use pianola_ports::types::{Seconds, Velocity01};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BPM: f64 = 120.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub start_time: Seconds,
    pub duration: Seconds,
    pub velocity: Velocity01,
    pub hand: Hand,
    pub hit: bool,
}

impl Note {
    pub fn new(pitch: u8, start_time: Seconds, duration: Seconds, velocity: Velocity01, hand: Hand) -> Self {
        Self {
            pitch,
            start_time,
            duration,
            velocity,
            hand,
            hit: false,
        }
    }

    pub fn end_time(&self) -> Seconds {
        self.start_time + self.duration
    }

    pub fn reference(&self) -> ReferenceNote {
        ReferenceNote {
            pitch: self.pitch,
            start_time: self.start_time,
            duration: self.duration,
            velocity: self.velocity,
            hand: self.hand,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scale {
    Major,
    Minor,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    pub key: String,
    pub scale: Scale,
}

const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_KEYS: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];

impl KeySignature {
    /// `sharps` is negative for flats, as stored in the SMF key signature meta event.
    pub fn from_accidentals(sharps: i8, minor: bool) -> Option<Self> {
        if !(-7..=7).contains(&sharps) {
            return None;
        }
        let idx = (sharps + 7) as usize;
        let (key, scale) = if minor {
            (MINOR_KEYS[idx], Scale::Minor)
        } else {
            (MAJOR_KEYS[idx], Scale::Major)
        };
        Some(Self {
            key: key.to_string(),
            scale,
        })
    }
}

/// A loaded piece. Notes are ordered by `start_time` when the song is built
/// and stay in that order; afterwards only their `hit` flags change.
#[derive(Clone, Debug, Serialize)]
pub struct Song {
    pub name: String,
    pub bpm: f64,
    pub key_signature: Option<KeySignature>,
    pub duration: Seconds,
    notes: Vec<Note>,
}

impl Song {
    pub fn new(
        name: impl Into<String>,
        bpm: f64,
        key_signature: Option<KeySignature>,
        mut notes: Vec<Note>,
    ) -> Self {
        notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        let duration = notes.iter().map(Note::end_time).fold(0.0, f64::max);
        let bpm = if bpm.is_finite() && bpm > 0.0 {
            bpm
        } else {
            DEFAULT_BPM
        };
        Self {
            name: name.into(),
            bpm,
            key_signature,
            duration,
            notes,
        }
    }

    pub fn empty() -> Self {
        Self::new("Untitled", DEFAULT_BPM, None, Vec::new())
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Seconds per beat.
    pub fn beat_duration(&self) -> Seconds {
        60.0 / self.bpm
    }

    /// Returns false when the index is out of range or the note was already hit.
    pub fn mark_hit(&mut self, index: usize) -> bool {
        match self.notes.get_mut(index) {
            Some(note) if !note.hit => {
                note.hit = true;
                true
            }
            _ => false,
        }
    }

    pub fn clear_hits(&mut self) {
        for note in &mut self.notes {
            note.hit = false;
        }
    }

    pub fn hit_count(&self) -> usize {
        self.notes.iter().filter(|n| n.hit).count()
    }
}

impl Default for Song {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: u8, start: f64) -> Note {
        Note::new(pitch, start, 0.5, Velocity01::new(0.8), Hand::Unspecified)
    }

    #[test]
    fn new_song_orders_notes_stably() {
        let song = Song::new(
            "order",
            100.0,
            None,
            vec![note(64, 1.0), note(60, 0.0), note(67, 1.0)],
        );
        let pitches: Vec<u8> = song.notes().iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 64, 67]);
        assert_eq!(song.duration, 1.5);
    }

    #[test]
    fn invalid_bpm_falls_back_to_default() {
        assert_eq!(Song::new("zero", 0.0, None, Vec::new()).bpm, DEFAULT_BPM);
        assert_eq!(Song::new("nan", f64::NAN, None, Vec::new()).bpm, DEFAULT_BPM);
    }

    #[test]
    fn key_names_follow_circle_of_fifths() {
        let d_major = KeySignature::from_accidentals(2, false).unwrap();
        assert_eq!(d_major.key, "D");
        let a_minor = KeySignature::from_accidentals(0, true).unwrap();
        assert_eq!(a_minor.key, "A");
        assert_eq!(a_minor.scale, Scale::Minor);
        let e_flat = KeySignature::from_accidentals(-3, false).unwrap();
        assert_eq!(e_flat.key, "Eb");
        assert!(KeySignature::from_accidentals(9, false).is_none());
    }

    #[test]
    fn mark_hit_only_once() {
        let mut song = Song::new("hits", 120.0, None, vec![note(60, 0.0)]);
        assert!(song.mark_hit(0));
        assert!(!song.mark_hit(0));
        assert!(!song.mark_hit(5));
        song.clear_hits();
        assert_eq!(song.hit_count(), 0);
    }
}
