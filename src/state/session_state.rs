//! Session state and control command definitions
//!
//! This module defines the three states a crawl session moves through and the
//! operator commands that drive the transitions between them.

use crate::BlcError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents the current state of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session has not started yet, or has finished, or was cancelled
    Stopped,

    /// Session is actively fetching pages
    InProgress,

    /// Session is suspended until a `proceed` command (or the pause timeout)
    Paused,
}

impl SessionState {
    /// Returns the wire/log representation of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
        }
    }

    /// Applies an operator command to this state
    ///
    /// # Transitions
    ///
    /// | Command | From | To |
    /// |---------|------|----|
    /// | Pause | InProgress | Paused |
    /// | Proceed | Paused | InProgress |
    /// | Cancel | any | Stopped |
    ///
    /// Any other combination leaves the state unchanged.
    pub fn apply(self, command: Command) -> Self {
        match (command, self) {
            (Command::Pause, Self::InProgress) => Self::Paused,
            (Command::Proceed, Self::Paused) => Self::InProgress,
            (Command::Cancel, _) => Self::Stopped,
            (_, current) => current,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Stopped
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operator command accepted by a running session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Pause,
    Proceed,
    Cancel,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Proceed => "proceed",
            Self::Cancel => "cancel",
        }
    }
}

impl FromStr for Command {
    type Err = BlcError;

    /// Parses a command name, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pause" => Ok(Self::Pause),
            "proceed" => Ok(Self::Proceed),
            "cancel" => Ok(Self::Cancel),
            _ => Err(BlcError::UnknownCommand(s.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
