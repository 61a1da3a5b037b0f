pub mod app;
pub mod diagnostics;
pub mod game;
pub mod ipc;
pub mod listeners;
pub mod metronome;
pub mod scheduler;
pub mod transport;

pub use app::*;
pub use diagnostics::*;
pub use game::*;
pub use ipc::*;
pub use listeners::*;
pub use metronome::*;
pub use scheduler::*;
pub use transport::*;
