use crate::model::{Hand, KeySignature, Note, Song, DEFAULT_BPM};
use crate::tempo::{TempoMap, TempoPoint};
use log::{debug, info, warn};
use midly::{Fps, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEventKind};
use pianola_ports::types::{Tick, Velocity01};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

/// Pitches below this go to the left hand when tracks can't tell us.
pub const MIDDLE_C: u8 = 60;

#[derive(thiserror::Error, Debug)]
pub enum MidiImportError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Clone, Copy, Debug)]
struct NoteInterval {
    key: u8,
    velocity: u8,
    start_tick: Tick,
    end_tick: Tick,
    order: usize,
}

#[derive(Default)]
struct FileMeta {
    title: Option<String>,
    tempo_points: BTreeMap<Tick, u32>,
    key_signature: Option<(Tick, KeySignature)>,
}

pub fn import_midi_path(path: &Path) -> Result<Song, MidiImportError> {
    let data = std::fs::read(path).map_err(|e| MidiImportError::Io(e.to_string()))?;
    let fallback_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled");
    import_midi_bytes(&data, fallback_name)
}

/// Parses a Standard MIDI File into a hand-labelled, time-ordered song.
/// `fallback_name` is used when the file carries no title of its own.
pub fn import_midi_bytes(data: &[u8], fallback_name: &str) -> Result<Song, MidiImportError> {
    let smf = Smf::parse(data).map_err(|e| MidiImportError::Parse(e.to_string()))?;
    let (ppq, tempo_override) = match smf.header.timing {
        Timing::Metrical(ticks) => (ticks.as_int(), None),
        Timing::Timecode(fps, ticks_per_frame) => {
            let (ppq, us_per_quarter) = timecode_ppq_and_tempo(fps, ticks_per_frame);
            (ppq, Some(us_per_quarter))
        }
    };
    debug!(
        "midi format {:?}, {} track(s), ppq {}",
        smf.header.format,
        smf.tracks.len(),
        ppq
    );

    let mut meta = FileMeta::default();
    let mut track_intervals: Vec<Vec<NoteInterval>> = Vec::new();
    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let intervals = collect_track(track_idx, track, ppq, &mut meta);
        if !intervals.is_empty() {
            track_intervals.push(intervals);
        }
    }

    let bpm = meta
        .tempo_points
        .iter()
        .next()
        .map(|(&tick, &us_per_quarter)| {
            TempoPoint {
                tick,
                us_per_quarter,
            }
            .bpm()
        })
        .unwrap_or(DEFAULT_BPM);

    let tempo_map = TempoMap::new(ppq, build_tempo_points(&meta.tempo_points, tempo_override));
    let tracks: Vec<Vec<Note>> = track_intervals
        .into_iter()
        .map(|intervals| intervals_to_notes(&tempo_map, intervals))
        .filter(|notes| !notes.is_empty())
        .collect();

    let mut notes = assign_hands(tracks);
    notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    trim_leading_silence(&mut notes);

    let name = meta.title.unwrap_or_else(|| fallback_name.to_string());
    let key_signature = meta.key_signature.map(|(_, key)| key);
    info!("imported '{}': {} notes at {:.1} bpm", name, notes.len(), bpm);

    Ok(Song::new(name, bpm, key_signature, notes))
}

/// Labels every note with a hand.
///
/// With two or more non-empty tracks, tracks are ranked by mean pitch and the
/// lower `floor(n / 2)` become the left hand; an odd middle track lands on the
/// right. With a single track each note is split at middle C instead. This is
/// a heuristic, not a classifier: crossing hands or a melody-only track will
/// be labelled wrongly.
pub fn assign_hands(tracks: Vec<Vec<Note>>) -> Vec<Note> {
    let tracks: Vec<Vec<Note>> = tracks.into_iter().filter(|t| !t.is_empty()).collect();

    if tracks.len() < 2 {
        return tracks
            .into_iter()
            .flatten()
            .map(|mut note| {
                note.hand = if note.pitch < MIDDLE_C {
                    Hand::Left
                } else {
                    Hand::Right
                };
                note.hit = false;
                note
            })
            .collect();
    }

    let mut ranked: Vec<(f64, Vec<Note>)> = tracks
        .into_iter()
        .map(|notes| (mean_pitch(&notes), notes))
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    let split = ranked.len() / 2;
    let mut out = Vec::with_capacity(ranked.iter().map(|(_, n)| n.len()).sum());
    for (rank, (mean, notes)) in ranked.into_iter().enumerate() {
        let hand = if rank < split { Hand::Left } else { Hand::Right };
        debug!("track with mean pitch {:.1} -> {:?}", mean, hand);
        out.extend(notes.into_iter().map(|mut note| {
            note.hand = hand;
            note.hit = false;
            note
        }));
    }
    out
}

/// Shifts an already time-sorted note list so the first note starts at zero.
pub fn trim_leading_silence(notes: &mut [Note]) {
    let Some(first) = notes.first().map(|n| n.start_time) else {
        return;
    };
    if first <= 0.0 {
        return;
    }
    debug!("trimming {:.3}s of leading silence", first);
    for note in notes.iter_mut() {
        note.start_time -= first;
    }
}

fn mean_pitch(notes: &[Note]) -> f64 {
    let sum: f64 = notes.iter().map(|n| n.pitch as f64).sum();
    sum / notes.len() as f64
}

fn collect_track(
    track_idx: usize,
    track: &Track<'_>,
    ppq: u16,
    meta: &mut FileMeta,
) -> Vec<NoteInterval> {
    let mut tick: Tick = 0;
    let mut open: HashMap<(u8, u8), VecDeque<(Tick, u8, usize)>> = HashMap::new();
    let mut intervals: Vec<NoteInterval> = Vec::new();
    let mut next_order = 0usize;

    for event in track {
        tick += event.delta.as_int() as Tick;
        match &event.kind {
            TrackEventKind::Midi { channel, message } => {
                let ch = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        open.entry((ch, key.as_int()))
                            .or_default()
                            .push_back((tick, vel.as_int(), next_order));
                        next_order += 1;
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        let key = key.as_int();
                        match open.get_mut(&(ch, key)).and_then(|q| q.pop_front()) {
                            Some((start_tick, velocity, order)) => intervals.push(NoteInterval {
                                key,
                                velocity,
                                start_tick,
                                end_tick: tick,
                                order,
                            }),
                            None => debug!(
                                "orphaned note off for {} ch{} at tick {} (track {})",
                                key, ch, tick, track_idx
                            ),
                        }
                    }
                    _ => {}
                }
            }
            TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter)) => {
                meta.tempo_points
                    .entry(tick)
                    .or_insert(us_per_quarter.as_int());
            }
            TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)) => {
                let earlier = meta
                    .key_signature
                    .as_ref()
                    .is_some_and(|(at, _)| *at <= tick);
                if !earlier {
                    if let Some(key) = KeySignature::from_accidentals(*sharps, *minor) {
                        meta.key_signature = Some((tick, key));
                    }
                }
            }
            TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                if track_idx == 0 && meta.title.is_none() {
                    let name = String::from_utf8_lossy(bytes).trim().to_string();
                    if !name.is_empty() {
                        meta.title = Some(name);
                    }
                }
            }
            _ => {}
        }
    }

    let last_tick = tick;
    for ((ch, key), pending) in open {
        for (start_tick, velocity, order) in pending {
            let end_tick = if last_tick > start_tick {
                last_tick
            } else {
                start_tick + ppq.max(1) as Tick
            };
            warn!(
                "unclosed note {} ch{} at tick {}, closing at {} (track {})",
                key, ch, start_tick, end_tick, track_idx
            );
            intervals.push(NoteInterval {
                key,
                velocity,
                start_tick,
                end_tick,
                order,
            });
        }
    }

    intervals.sort_by_key(|interval| interval.order);
    intervals
}

fn intervals_to_notes(tempo_map: &TempoMap, intervals: Vec<NoteInterval>) -> Vec<Note> {
    intervals
        .into_iter()
        .filter_map(|interval| {
            let start = tempo_map.tick_to_seconds(interval.start_tick);
            let end = tempo_map.tick_to_seconds(interval.end_tick);
            if end <= start {
                debug!(
                    "skipping zero-length note {} at tick {}",
                    interval.key, interval.start_tick
                );
                return None;
            }
            Some(Note::new(
                interval.key,
                start,
                end - start,
                Velocity01::from_midi(interval.velocity),
                Hand::Unspecified,
            ))
        })
        .collect()
}

fn build_tempo_points(
    tempo_points: &BTreeMap<Tick, u32>,
    override_us_per_quarter: Option<u32>,
) -> Vec<TempoPoint> {
    if let Some(us_per_quarter) = override_us_per_quarter {
        return vec![TempoPoint {
            tick: 0,
            us_per_quarter,
        }];
    }

    tempo_points
        .iter()
        .map(|(&tick, &us_per_quarter)| TempoPoint {
            tick,
            us_per_quarter,
        })
        .collect()
}

fn timecode_ppq_and_tempo(fps: Fps, ticks_per_frame: u8) -> (u16, u32) {
    let ticks_per_frame = ticks_per_frame.max(1) as u16;
    match fps {
        Fps::Fps24 => (24 * ticks_per_frame, 1_000_000),
        Fps::Fps25 => (25 * ticks_per_frame, 1_000_000),
        Fps::Fps30 => (30 * ticks_per_frame, 1_000_000),
        Fps::Fps29 => (30 * ticks_per_frame, 1_001_000),
    }
}
