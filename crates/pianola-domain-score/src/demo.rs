use crate::model::{Hand, Note, Song, DEFAULT_BPM};
use pianola_ports::types::Velocity01;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const DEMO_NOTE_COUNT: usize = 50;
const DEMO_FIRST_NOTE: f64 = 2.0;
const DEMO_LOWEST_PITCH: u8 = 48;
const DEMO_PITCH_SPAN: u8 = 24;

/// Random practice material: a run of single notes around middle C with
/// loose spacing. The same seed always produces the same song.
pub fn generate_practice_song(seed: u64) -> Song {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut notes = Vec::with_capacity(DEMO_NOTE_COUNT);
    let mut time = DEMO_FIRST_NOTE;

    for _ in 0..DEMO_NOTE_COUNT {
        let pitch = DEMO_LOWEST_PITCH + rng.random_range(0..DEMO_PITCH_SPAN);
        let duration = 0.5 + rng.random::<f64>() * 0.5;
        notes.push(Note::new(
            pitch,
            time,
            duration,
            Velocity01::new(0.8),
            Hand::Unspecified,
        ));
        time += duration + rng.random::<f64>() * 0.5;
    }

    Song::new(format!("Practice #{seed}"), DEFAULT_BPM, None, notes)
}
