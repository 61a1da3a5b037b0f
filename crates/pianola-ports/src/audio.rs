use crate::playback::ReferenceNote;
use crate::types::Velocity01;

/// Sound collaborator. Every call is a fire-and-forget notification: the
/// engine never waits on it and never reads anything back.
pub trait AudioCuePort: Send + Sync {
    /// Monitor a note the performer just pressed.
    fn play_note(&self, pitch: u8, velocity: Velocity01);

    fn play_reference_note(&self, note: &ReferenceNote);

    fn stop_note(&self, pitch: u8);

    fn play_click(&self, is_downbeat: bool);
}

/// Sink used when no sound backend is attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentAudio;

impl AudioCuePort for SilentAudio {
    fn play_note(&self, _pitch: u8, _velocity: Velocity01) {}

    fn play_reference_note(&self, _note: &ReferenceNote) {}

    fn stop_note(&self, _pitch: u8) {}

    fn play_click(&self, _is_downbeat: bool) {}
}
