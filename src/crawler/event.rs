//! Progress events streamed by a crawl session
//!
//! Every event carries a snapshot of the session (id, state, counters) plus a
//! kind-specific payload. The JSON shape is flat: the payload fields sit next
//! to the snapshot fields and a `kind` tag names the variant.

use crate::state::{Command, SessionState};
use serde::Serialize;

/// A single message on a session's progress stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlEvent {
    pub session_id: u64,
    pub state: SessionState,
    pub total_visited: usize,
    pub total_errors: usize,
    /// Seed list so far; only populated on progress and completion events
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seed_urls: Vec<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Payload of a [`CrawlEvent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Periodic or lifecycle snapshot with no link attached
    Progress,

    /// A link answered with a non-error status
    Success {
        url: String,
        http_status: u16,
        parent_url: String,
    },

    /// A link failed; `http_status` is 0 for transport failures
    Failure {
        url: String,
        http_status: u16,
        message: String,
        parent_url: String,
    },

    /// An operator command was applied
    StateChanged { command: Command },

    /// The session has been finalized and deregistered
    Completed,
}

impl CrawlEvent {
    /// The link this event reports on, if any
    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Success { url, .. } | EventKind::Failure { url, .. } => Some(url),
            _ => None,
        }
    }

    /// `Some(true)` for a reachable link, `Some(false)` for a failed one,
    /// `None` for events that do not describe a fetch
    pub fn fetched_ok(&self) -> Option<bool> {
        match self.kind {
            EventKind::Success { .. } => Some(true),
            EventKind::Failure { .. } => Some(false),
            _ => None,
        }
    }

    /// Serializes the event to a single JSON line
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
