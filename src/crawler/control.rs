//! Shared control surface of a crawl session
//!
//! The traversal task owns the crawl data; everything a concurrent controller
//! may touch lives here behind synchronization:
//! - the session state, held in a `watch` cell so the pause wait can sleep
//!   until a command changes it
//! - the single-slot pending command
//! - visited/error counters mirrored from the traversal for progress events
//! - the sending half of the progress stream

use crate::crawler::event::{CrawlEvent, EventKind};
use crate::state::{Command, SessionState};
use crate::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

struct SessionControl {
    id: u64,
    state: watch::Sender<SessionState>,
    /// Last command wins; commands arriving back to back are coalesced
    pending: Mutex<Option<Command>>,
    visited: AtomicUsize,
    errors: AtomicUsize,
    events: mpsc::Sender<CrawlEvent>,
}

/// Cloneable handle used to observe and command a session
#[derive(Clone)]
pub struct SessionHandle {
    control: Arc<SessionControl>,
}

impl SessionHandle {
    pub(crate) fn new(id: u64, events: mpsc::Sender<CrawlEvent>) -> Self {
        let (state, _) = watch::channel(SessionState::Stopped);
        Self {
            control: Arc::new(SessionControl {
                id,
                state,
                pending: Mutex::new(None),
                visited: AtomicUsize::new(0),
                errors: AtomicUsize::new(0),
                events,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.control.id
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.control.state.borrow()
    }

    /// Receiver that is notified on every state change
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.control.state.subscribe()
    }

    pub fn total_visited(&self) -> usize {
        self.control.visited.load(Ordering::SeqCst)
    }

    pub fn total_errors(&self) -> usize {
        self.control.errors.load(Ordering::SeqCst)
    }

    /// Command waiting to be applied, if a controller is mid-way through one
    pub fn pending_command(&self) -> Option<Command> {
        self.control.pending.try_lock().ok().and_then(|slot| *slot)
    }

    /// Accepts an operator command by name (case-insensitive)
    ///
    /// The command is stored in the pending slot, applied to the state at
    /// once, announced on the progress stream and then cleared. Unknown
    /// names are rejected without touching the session.
    ///
    /// # Returns
    ///
    /// * `Ok(SessionState)` - The state after the command was applied
    /// * `Err(BlcError::UnknownCommand)` - The name is not a known command
    pub async fn command(&self, name: &str) -> Result<SessionState> {
        let command: Command = name.parse()?;
        tracing::info!(session_id = self.id(), %command, "Command received");

        let mut pending = self.control.pending.lock().await;
        *pending = Some(command);

        let mut applied = SessionState::Stopped;
        self.control.state.send_if_modified(|state| {
            let next = state.apply(command);
            applied = next;
            let changed = next != *state;
            *state = next;
            changed
        });

        self.emit(self.snapshot(EventKind::StateChanged { command }, Vec::new()))
            .await;
        *pending = None;

        Ok(applied)
    }

    pub(crate) fn set_state(&self, state: SessionState) -> SessionState {
        self.control.state.send_replace(state)
    }

    pub(crate) fn record_totals(&self, visited: usize, errors: usize) {
        self.control.visited.store(visited, Ordering::SeqCst);
        self.control.errors.store(errors, Ordering::SeqCst);
    }

    /// Builds an event carrying the current snapshot of the session
    pub(crate) fn snapshot(&self, kind: EventKind, seed_urls: Vec<String>) -> CrawlEvent {
        CrawlEvent {
            session_id: self.id(),
            state: self.state(),
            total_visited: self.total_visited(),
            total_errors: self.total_errors(),
            seed_urls,
            kind,
        }
    }

    /// Sends an event, waiting for the consumer to accept it
    ///
    /// A closed stream is not an error: the crawl carries on without anyone
    /// listening.
    pub(crate) async fn emit(&self, event: CrawlEvent) {
        if self.control.events.send(event).await.is_err() {
            tracing::trace!(session_id = self.id(), "Progress stream closed, event dropped");
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
