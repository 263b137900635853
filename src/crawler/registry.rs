//! Registry of live crawl sessions
//!
//! The registry assigns session ids, keeps a handle per running session and
//! fans each session's progress stream out to any number of listeners. It
//! is the only place sessions are inserted or removed.

use crate::crawler::control::SessionHandle;
use crate::crawler::event::CrawlEvent;
use crate::crawler::session::{CompletedSession, CrawlSession, SessionSettings};
use crate::state::SessionState;
use crate::{BlcError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

type Listeners = Arc<Mutex<Vec<mpsc::Sender<CrawlEvent>>>>;

struct Entry {
    handle: SessionHandle,
    listeners: Listeners,
}

struct Inner {
    next_id: u64,
    sessions: HashMap<u64, Entry>,
}

/// Lock-guarded map of session id to session
pub struct SessionRegistry {
    settings: SessionSettings,
    event_buffer: usize,
    completions: mpsc::Sender<CompletedSession>,
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    /// Creates an empty registry
    ///
    /// # Arguments
    ///
    /// * `settings` - Settings given to every new session
    /// * `event_buffer` - Capacity of each session's progress stream
    /// * `completions` - Where finished sessions are delivered
    pub fn new(
        settings: SessionSettings,
        event_buffer: usize,
        completions: mpsc::Sender<CompletedSession>,
    ) -> Self {
        Self {
            settings,
            event_buffer: event_buffer.max(1),
            completions,
            inner: Mutex::new(Inner {
                next_id: 1,
                sessions: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates and registers a session with the default delay
    ///
    /// Must be called from within a tokio runtime: the session's broadcaster
    /// task is spawned here.
    pub fn create(&self) -> Result<CrawlSession> {
        self.create_with_delay(self.settings.delay)
    }

    /// Creates and registers a session with its own politeness delay
    pub fn create_with_delay(&self, delay: Duration) -> Result<CrawlSession> {
        let (events_tx, events_rx) = mpsc::channel(self.event_buffer);
        let settings = SessionSettings {
            delay,
            ..self.settings.clone()
        };

        let mut inner = self.lock();
        let id = inner.next_id;
        let session = CrawlSession::new(id, settings, events_tx, self.completions.clone())?;
        inner.next_id += 1;

        let listeners: Listeners = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(broadcast(events_rx, Arc::clone(&listeners)));

        inner.sessions.insert(
            id,
            Entry {
                handle: session.handle(),
                listeners,
            },
        );

        tracing::info!("Registered session {}", id);
        Ok(session)
    }

    /// Handle of a registered session
    pub fn get(&self, id: u64) -> Option<SessionHandle> {
        self.lock().sessions.get(&id).map(|entry| entry.handle.clone())
    }

    /// Deregisters a session, returning its handle
    pub fn remove(&self, id: u64) -> Option<SessionHandle> {
        let removed = self.lock().sessions.remove(&id).map(|entry| entry.handle);
        if removed.is_some() {
            tracing::info!("Deregistered session {}", id);
        }
        removed
    }

    /// Attaches a new listener to a session's progress stream
    ///
    /// The listener receives every event emitted after this call. A listener
    /// that stops reading holds back the whole session; dropping the
    /// receiver detaches it.
    pub fn subscribe(&self, id: u64, buffer: usize) -> Result<mpsc::Receiver<CrawlEvent>> {
        let inner = self.lock();
        let entry = inner
            .sessions
            .get(&id)
            .ok_or(BlcError::UnknownSession(id))?;

        let (tx, rx) = mpsc::channel(buffer.max(1));
        entry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Ok(rx)
    }

    /// Sends an operator command to a registered session
    pub async fn command(&self, id: u64, name: &str) -> Result<SessionState> {
        let handle = self.get(id).ok_or(BlcError::UnknownSession(id))?;
        handle.command(name).await
    }

    /// Ids of all registered sessions, ascending
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.lock().sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Forwards a session's events to every attached listener, in order
///
/// Each listener gets every event; a full listener is awaited rather than
/// skipped. Closed listeners are dropped. The task ends when the session's
/// last event sender is gone.
async fn broadcast(mut events: mpsc::Receiver<CrawlEvent>, listeners: Listeners) {
    while let Some(event) = events.recv().await {
        let targets = listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for target in &targets {
            let _ = target.send(event.clone()).await;
        }

        listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| !tx.is_closed());
    }
}
