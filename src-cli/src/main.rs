mod args;

use anyhow::{bail, Result};
use args::Args;
use clap::Parser;
use log::{debug, info, warn};
use pianola_core::{AppCore, Command, Event, SongSource};
use pianola_domain_score::{generate_practice_song, import_midi_path, Song};
use pianola_infra_midi_midir::MidirMidiInputPort;
use pianola_infra_storage_fs::FsStorage;
use pianola_ports::audio::AudioCuePort;
use pianola_ports::midi::MidiInputPort;
use pianola_ports::playback::ReferenceNote;
use pianola_ports::storage::StoragePort;
use pianola_ports::types::{DeviceId, Velocity01};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Keeps running this long after the last note so late presses still count.
const TAIL_SECS: f64 = 2.0;

/// Stand-in for a synth: writes every cue to the log.
struct CueLogger;

impl AudioCuePort for CueLogger {
    fn play_note(&self, pitch: u8, velocity: Velocity01) {
        debug!("monitor {} vel {:.2}", pitch, velocity.get());
    }

    fn play_reference_note(&self, note: &ReferenceNote) {
        info!(
            "note {:>3} {:?} at {:.3}s for {:.3}s",
            note.pitch, note.hand, note.start_time, note.duration
        );
    }

    fn stop_note(&self, pitch: u8) {
        debug!("release {}", pitch);
    }

    fn play_click(&self, is_downbeat: bool) {
        info!("{}", if is_downbeat { "TICK" } else { "tick" });
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_inputs {
        let devices = MidirMidiInputPort::default().list_inputs()?;
        if devices.is_empty() {
            println!("no midi inputs found");
        }
        for device in devices {
            println!("{}\t{}", device.id, device.name);
        }
        return Ok(());
    }

    let source = match (&args.midi, args.demo) {
        (_, Some(seed)) => SongSource::Demo { seed },
        (Some(path), None) => SongSource::MidiFile(path.to_string_lossy().into_owned()),
        (None, None) => bail!("a MIDI file or --demo seed is required"),
    };

    if args.dry_run {
        let song = match &source {
            SongSource::MidiFile(path) => import_midi_path(path.as_ref())?,
            SongSource::Demo { seed } => generate_practice_song(*seed),
        };
        print_preview(&song, args.dry_run_max);
        return Ok(());
    }

    let storage: Option<Box<dyn StoragePort>> = Some(Box::new(FsStorage::default()));
    let mut app = AppCore::new(
        Box::new(MidirMidiInputPort::default()),
        Arc::new(CueLogger),
        storage,
    );
    apply_overrides(&mut app, &args)?;
    app.handle_command(Command::LoadSong { source })?;
    app.handle_command(Command::Play)?;

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        warn!("Ctrl-C received, stopping..!");
        running_for_handler.store(false, Ordering::SeqCst);
    })?;

    let frame = Duration::from_millis(args.frame_ms.max(1));
    let end = app.game().song().duration + TAIL_SECS;
    let mut last = Instant::now();
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        app.tick(now.duration_since(last).as_secs_f64());
        last = now;

        for event in app.drain_events() {
            report(&event);
        }
        if app.game().is_finished() && app.game().current_time() >= end {
            break;
        }
        std::thread::sleep(frame);
    }

    let stats = app.game().stats();
    info!(
        "score {} | max combo {} | {} hit, {} missed ({:.0}% accuracy)",
        stats.score,
        stats.max_combo,
        stats.hits,
        stats.misses,
        stats.accuracy() * 100.0
    );
    Ok(())
}

fn apply_overrides(app: &mut AppCore, args: &Args) -> Result<()> {
    if let Some(x) = args.speed {
        app.handle_command(Command::SetPlaybackSpeed { x })?;
    }
    if args.no_metronome {
        app.handle_command(Command::SetMetronomeEnabled { enabled: false })?;
    }
    if args.hide_left || args.hide_right {
        app.handle_command(Command::SetVisibleHands {
            left: !args.hide_left,
            right: !args.hide_right,
        })?;
    }
    if let Some(id) = &args.midi_in {
        let selected = app.handle_command(Command::SelectMidiInput {
            device_id: DeviceId(id.clone()),
        });
        if let Err(e) = selected {
            warn!("could not open midi input '{}': {}", id, e);
        }
    }
    Ok(())
}

fn report(event: &Event) {
    match event {
        Event::SongLoaded {
            name,
            bpm,
            key_signature,
            note_count,
            duration,
        } => {
            let key = key_signature
                .as_ref()
                .map(|k| format!("{} {:?}", k.key, k.scale))
                .unwrap_or_else(|| "<no key>".into());
            info!(
                "'{}': {} notes, {:.1} bpm, {}, {:.1}s",
                name, note_count, bpm, key, duration
            );
        }
        Event::JudgeFeedback {
            pitch,
            grade,
            points,
            ..
        } => info!("{:?} on {} (+{})", grade, pitch, points),
        Event::ScoreUpdated { score, combo, .. } => debug!("score {} combo {}", score, combo),
        Event::MidiUnavailable { reason } => {
            warn!("no midi input, playing back only: {}", reason)
        }
        _ => {}
    }
}

fn print_preview(song: &Song, max: usize) {
    info!(
        "'{}': {} notes, {:.1} bpm, {:.3}s",
        song.name,
        song.len(),
        song.bpm,
        song.duration
    );
    for (i, note) in song.notes().iter().take(max).enumerate() {
        info!(
            "Note {}: pitch={} hand={:?} start={:.3} dur={:.3} vel={:.2}",
            i,
            note.pitch,
            note.hand,
            note.start_time,
            note.duration,
            note.velocity.get()
        );
    }
}
