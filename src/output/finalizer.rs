//! Turns completed sessions into reports
//!
//! Exactly one finalizer consumes the completion channel. For each finished
//! session it writes the reports, prunes old ones, sends the session's last
//! event and deregisters it. Report failures are logged and never stop the
//! finalizer.

use crate::crawler::{CompletedSession, EventKind, SessionRegistry};
use crate::output::report::{ReportData, ReportStore};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

pub struct Finalizer {
    registry: Arc<SessionRegistry>,
    store: ReportStore,
    config_hash: Option<String>,
    finalized: watch::Sender<u64>,
}

impl Finalizer {
    pub fn new(registry: Arc<SessionRegistry>, store: ReportStore) -> Self {
        let (finalized, _) = watch::channel(0);
        Self {
            registry,
            store,
            config_hash: None,
            finalized,
        }
    }

    /// Records the hash of the configuration the sessions were started with
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Number of sessions finalized so far
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.finalized.subscribe()
    }

    /// Finalizes sessions until the completion channel closes
    pub async fn run(self, mut completions: mpsc::Receiver<CompletedSession>) {
        while let Some(completed) = completions.recv().await {
            self.finalize(completed).await;
        }
        tracing::debug!("Completion channel closed, finalizer exiting");
    }

    async fn finalize(&self, completed: CompletedSession) {
        let id = completed.id;
        let mut report = ReportData::from_session(&completed);
        report.config_hash = self.config_hash.clone();

        match self.store.save(&report) {
            Ok(saved) => {
                tracing::info!(
                    "Report for session {} saved in {}",
                    id,
                    saved.json_path.display()
                );
                if let Some(csv) = saved.csv_path {
                    tracing::info!("CSV report for session {} saved in {}", id, csv.display());
                }
            }
            Err(e) => tracing::error!("Report for session {} was not saved: {}", id, e),
        }

        if let Err(e) = self.store.prune() {
            tracing::error!("Failed to clean up reports directory: {}", e);
        }

        // Last event of the session; listeners refresh their report view on it
        let handle = &completed.handle;
        handle
            .emit(handle.snapshot(EventKind::Completed, completed.seeds.clone()))
            .await;

        self.registry.remove(id);
        self.finalized.send_modify(|count| *count += 1);
    }
}
