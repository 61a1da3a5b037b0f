pub mod audio;
pub mod midi;
pub mod playback;
pub mod storage;
pub mod types;

pub use audio::*;
pub use midi::*;
pub use playback::*;
pub use storage::*;
pub use types::*;
