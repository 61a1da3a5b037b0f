use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pianola",
    about = "Practice a piece against a metronome and a MIDI keyboard"
)]
pub struct Args {
    /// Path to the MIDI file to practice.
    #[arg(required_unless_present_any = ["demo", "list_inputs"])]
    pub midi: Option<PathBuf>,

    /// Practice a generated song instead, from this seed.
    #[arg(long, conflicts_with = "midi")]
    pub demo: Option<u64>,

    /// Playback speed multiplier (minimum 0.1). Remembered for later runs.
    #[arg(short, long)]
    pub speed: Option<f64>,

    /// Silence the metronome after the countdown.
    #[arg(long, default_value_t = false)]
    pub no_metronome: bool,

    /// Hide the left-hand part: not played back, not scored.
    #[arg(long, default_value_t = false)]
    pub hide_left: bool,

    /// Hide the right-hand part.
    #[arg(long, default_value_t = false)]
    pub hide_right: bool,

    /// MIDI input device id, as printed by `--list-inputs`.
    #[arg(short = 'i', long)]
    pub midi_in: Option<String>,

    /// Print the available MIDI inputs and exit.
    #[arg(short, long, default_value_t = false)]
    pub list_inputs: bool,

    /// Frame length of the engine loop in milliseconds.
    #[arg(long, default_value_t = 16)]
    pub frame_ms: u64,

    /// Print the first notes of the song and exit.
    #[arg(short, long, default_value_t = false)]
    pub dry_run: bool,

    /// Maximum notes to print in a dry run.
    #[arg(long, default_value_t = 40)]
    pub dry_run_max: usize,
}
