// Public API for integration tests and potential library usage

pub mod host;
pub mod protocol;
pub mod puzzles;
pub mod registry;
pub mod reveal;
pub mod room;
pub mod types;
pub mod ws;
