use crate::types::*;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiLikeEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
}

/// Raw input from MIDI devices, not mapped to song time yet.
#[derive(Clone, Copy, Debug)]
pub struct PlayerEvent {
    pub at: Instant,
    pub event: MidiLikeEvent,
}

#[derive(thiserror::Error, Debug)]
pub enum MidiError {
    /// The host has no MIDI capability at all. Callers treat this as a
    /// state to report, not a failure.
    #[error("midi unsupported: {0}")]
    Unsupported(String),
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// MIDI input stream handle: drop closes it.
pub trait MidiInputStream: Send {
    fn close(self: Box<Self>);
}

pub type PlayerEventCallback = Arc<dyn Fn(PlayerEvent) + Send + Sync + 'static>;

pub trait MidiInputPort: Send + Sync {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError>;

    /// Open input stream: implementation should invoke cb from a background thread/callback.
    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: PlayerEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError>;
}

/// Decodes a raw channel message. Running status and sysex are not handled.
pub fn parse_midi_message(message: &[u8]) -> Option<MidiLikeEvent> {
    if message.len() < 3 {
        return None;
    }
    match message[0] & 0xF0 {
        0x80 => Some(MidiLikeEvent::NoteOff { note: message[1] }),
        0x90 => {
            let note = message[1];
            let velocity = message[2];
            if velocity == 0 {
                Some(MidiLikeEvent::NoteOff { note })
            } else {
                Some(MidiLikeEvent::NoteOn { note, velocity })
            }
        }
        _ => None,
    }
}
