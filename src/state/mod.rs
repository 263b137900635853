//! State module for tracking crawl session progress
//!
//! # Components
//!
//! - `SessionState`: Stopped / InProgress / Paused lifecycle of a session
//! - `Command`: operator commands (pause, proceed, cancel) and their transitions
//! - `Depth`: remaining traversal budget, with an explicit unlimited value

mod depth;
mod session_state;

// Re-export main types
pub use depth::Depth;
pub use session_state::{Command, SessionState};
