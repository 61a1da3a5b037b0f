pub mod demo;
pub mod midi_import;
pub mod model;
pub mod tempo;

pub use demo::*;
pub use midi_import::*;
pub use model::*;
pub use tempo::*;
