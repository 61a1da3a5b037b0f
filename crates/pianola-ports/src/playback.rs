use crate::types::{Seconds, Velocity01};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
    #[default]
    Unspecified,
}

/// Which hands currently take part in playback and scoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleHands {
    pub left: bool,
    pub right: bool,
}

impl VisibleHands {
    pub const BOTH: VisibleHands = VisibleHands {
        left: true,
        right: true,
    };

    /// `Unspecified` notes always pass.
    pub fn allows(self, hand: Hand) -> bool {
        match hand {
            Hand::Left => self.left,
            Hand::Right => self.right,
            Hand::Unspecified => true,
        }
    }
}

impl Default for VisibleHands {
    fn default() -> Self {
        Self::BOTH
    }
}

/// Snapshot of a note handed to listeners when it is due.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceNote {
    pub pitch: u8,
    pub start_time: Seconds,
    pub duration: Seconds,
    pub velocity: Velocity01,
    pub hand: Hand,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Click {
    pub beat_index: i64,
    pub is_downbeat: bool,
}
