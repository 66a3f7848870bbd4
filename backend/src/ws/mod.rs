//! Transport-facing pieces: presence tracking and the events relayed to
//! tournament lobby connections.

pub mod messages;
pub mod sessions;

pub use messages::{ServerMessage, Standing};
pub use sessions::{SessionDirectory, SessionTracker};
