//! Crawl session: depth-first link traversal with pause, cancel and retry
//!
//! A session walks every seed in order, fetching each link once and
//! following the links of HTML pages until the depth budget runs out. Links
//! that leave the host of the page they were found on are fetched but never
//! expanded. Traversal is sequential; only the state and the pending command
//! are shared with controllers (see [`SessionHandle`]).

use crate::config::CrawlerConfig;
use crate::crawler::control::SessionHandle;
use crate::crawler::event::{CrawlEvent, EventKind};
use crate::crawler::fetcher::{
    build_http_client, classify_response, is_html, matching_cookies, request_method,
    send_request, FetchOutcome, StoredCookie, CAPTCHA_MESSAGE,
};
use crate::crawler::parser::{extract_page_links, PageLinks};
use crate::state::{Depth, SessionState};
use crate::url::{extract_host, resolve_link, same_authority};
use crate::Result;
use chrono::{DateTime, Local};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use url::Url;

/// More outstanding errors than this stop the session
pub const ERROR_BUDGET: usize = 35;

/// Politeness delay used while re-fetching transient failures
pub const RETRY_DELAY: Duration = Duration::from_millis(3);

/// Timing and identity settings shared by every session of a process
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Pause before every fetch
    pub delay: Duration,
    pub request_timeout: Duration,
    /// A session paused longer than this is stopped
    pub pause_timeout: Duration,
    /// Interval of progress snapshots while paused
    pub heartbeat: Duration,
    pub user_agent: String,
}

impl SessionSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_ms),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            pause_timeout: Duration::from_secs(config.pause_timeout_secs),
            heartbeat: Duration::from_secs(config.heartbeat_secs),
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Current failure of a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// 0 when no HTTP response was received
    pub http_status: u16,
    pub message: String,
    pub parent_url: String,
    /// Budget the link was visited with, reused by the retry pass
    #[serde(skip, default = "unlimited")]
    pub depth: Depth,
}

fn unlimited() -> Depth {
    Depth::Unlimited
}

impl ErrorRecord {
    /// Transport failures and server errors are worth a second attempt;
    /// client errors are not
    pub fn is_transient(&self) -> bool {
        self.http_status == 0 || self.http_status >= 500
    }
}

/// Read-only result of a finished session, handed to the finalizer
#[derive(Debug, Clone)]
pub struct CompletedSession {
    pub id: u64,
    pub handle: SessionHandle,
    pub seeds: Vec<String>,
    /// Every fetched URL, sorted
    pub visited: Vec<String>,
    pub errors: BTreeMap<String, ErrorRecord>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub elapsed: Duration,
    /// Requests sent, including retries
    pub fetch_attempts: usize,
}

/// A pending visit on the work stack
#[derive(Debug, Clone)]
struct Frame {
    link: String,
    parent: String,
    depth: Depth,
    /// Discovered links are skipped when already visited or excluded; seeds
    /// and retries are not
    check_seen: bool,
}

enum Visit {
    /// Nothing more to do for this link
    Done,
    /// Links to visit next, in document order
    Expand(Vec<Frame>),
    /// The session stopped; abandon the walk
    Halt,
}

/// One crawl run
pub struct CrawlSession {
    handle: SessionHandle,
    settings: SessionSettings,
    client: Client,
    completions: mpsc::Sender<CompletedSession>,
    delay: Duration,
    seeds: Vec<String>,
    excluded: HashSet<String>,
    session_cookie: Option<String>,
    cookies: HashMap<String, Vec<StoredCookie>>,
    visited: HashSet<String>,
    errors: BTreeMap<String, ErrorRecord>,
    fetch_attempts: usize,
}

impl CrawlSession {
    /// Creates a stopped session with empty results
    ///
    /// Progress events go to `events`; the finished session is sent to
    /// `completions` when [`scan`](Self::scan) returns.
    pub fn new(
        id: u64,
        settings: SessionSettings,
        events: mpsc::Sender<CrawlEvent>,
        completions: mpsc::Sender<CompletedSession>,
    ) -> Result<Self> {
        let client = build_http_client(&settings)?;
        Ok(Self {
            handle: SessionHandle::new(id, events),
            delay: settings.delay,
            settings,
            client,
            completions,
            seeds: Vec::new(),
            excluded: HashSet::new(),
            session_cookie: None,
            cookies: HashMap::new(),
            visited: HashSet::new(),
            errors: BTreeMap::new(),
            fetch_attempts: 0,
        })
    }

    pub fn id(&self) -> u64 {
        self.handle.id()
    }

    /// Handle for commanding the session once `scan` owns it
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Crawls every seed, retries transient failures and hands the result
    /// to the completion channel
    ///
    /// Runs for the whole crawl. A negative or unlimited depth only stops on
    /// host boundaries, cancellation, the pause timeout or the error budget.
    pub async fn scan(
        mut self,
        seeds: Vec<String>,
        depth: Depth,
        session_cookie: Option<String>,
        excluded: Vec<String>,
    ) {
        let started_at = Local::now();
        let started = Instant::now();
        tracing::info!("Session {} started, depth {}", self.id(), depth);

        self.handle.set_state(SessionState::InProgress);
        self.emit_progress(false).await;

        self.session_cookie = session_cookie.filter(|name| !name.is_empty());
        self.excluded = excluded.iter().map(|u| normalize(u)).collect();

        for seed in seeds {
            self.seeds.push(seed.clone());
            self.emit_progress(true).await;

            let link = normalize(&seed);
            self.walk(Frame {
                parent: link.clone(),
                link,
                depth,
                check_seen: false,
            })
            .await;
        }

        self.retry_transient_errors().await;

        self.handle.set_state(SessionState::Stopped);
        self.emit_progress(true).await;

        let elapsed = started.elapsed();
        tracing::info!(
            "Session {} finished: {} links visited, {} errors in {:?}",
            self.id(),
            self.visited.len(),
            self.errors.len(),
            elapsed
        );

        let mut visited: Vec<String> = self.visited.into_iter().collect();
        visited.sort();

        let completed = CompletedSession {
            id: self.handle.id(),
            handle: self.handle,
            seeds: self.seeds,
            visited,
            errors: self.errors,
            started_at,
            finished_at: Local::now(),
            elapsed,
            fetch_attempts: self.fetch_attempts,
        };

        if self.completions.send(completed).await.is_err() {
            tracing::warn!("Completion channel closed, session result dropped");
        }
    }

    /// Depth-first walk from `root` using an explicit stack
    async fn walk(&mut self, root: Frame) {
        let mut stack = vec![root];

        while let Some(frame) = stack.pop() {
            if frame.check_seen
                && (self.visited.contains(&frame.link) || self.excluded.contains(&frame.link))
            {
                continue;
            }

            match self.visit(&frame).await {
                Visit::Done => {}
                Visit::Expand(children) => stack.extend(children.into_iter().rev()),
                Visit::Halt => return,
            }
        }
    }

    async fn visit(&mut self, frame: &Frame) -> Visit {
        if self.errors.len() > ERROR_BUDGET {
            if self.handle.set_state(SessionState::Stopped) != SessionState::Stopped {
                tracing::warn!(
                    "Session {} stopped: more than {} errors",
                    self.id(),
                    ERROR_BUDGET
                );
            }
            return Visit::Halt;
        }

        self.wait_while_paused().await;

        if self.handle.state() == SessionState::Stopped {
            return Visit::Halt;
        }

        if frame.depth.is_exhausted() {
            return Visit::Done;
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.visited.insert(frame.link.clone());
        self.sync_totals();

        let url = match Url::parse(&frame.link) {
            Ok(url) => url,
            Err(e) => {
                self.record_error(frame, 0, format!("URL parse error: {}", e))
                    .await;
                return Visit::Done;
            }
        };

        let method = request_method(&url);
        let host = extract_host(&url);
        let cookies = host
            .as_ref()
            .and_then(|h| self.cookies.get(h))
            .cloned()
            .unwrap_or_default();

        tracing::debug!("{} {}", method, url);
        self.fetch_attempts += 1;

        let response = match send_request(&self.client, method.clone(), &url, &cookies).await {
            Ok(response) => response,
            Err(e) => {
                self.record_error(frame, 0, format!("{} error: {}", method, e))
                    .await;
                return Visit::Done;
            }
        };

        match classify_response(response.status(), response.headers()) {
            FetchOutcome::Challenged { status_code } => {
                self.record_error(frame, status_code, CAPTCHA_MESSAGE.to_string())
                    .await;
                return Visit::Done;
            }
            FetchOutcome::HttpError {
                status_code,
                reason,
            } => {
                self.record_error(frame, status_code, reason).await;
                return Visit::Done;
            }
            FetchOutcome::Reachable { status_code } => {
                self.record_success(frame, status_code).await;
            }
        }

        if frame.depth.is_leaf() || !is_html(response.headers()) {
            return Visit::Done;
        }

        if let Some(host) = host {
            self.capture_cookies(host, &response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Failed to read body of {}: {}", url, e);
                return Visit::Done;
            }
        };

        let page = extract_page_links(&body);
        Visit::Expand(self.discovered(&url, frame, page))
    }

    /// Resolves the links of a page into frames for the work stack
    fn discovered(&self, page_url: &Url, frame: &Frame, page: PageLinks) -> Vec<Frame> {
        // A relative <base href> is itself relative to the page, with its
        // trailing slash significant
        let declared_base = page
            .declared_base
            .as_deref()
            .and_then(|base| page_url.join(base).ok());

        page.links
            .iter()
            .filter_map(|raw| match resolve_link(raw, page_url, declared_base.as_ref()) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::trace!("Dropping link {:?} on {}: {}", raw, page_url, e);
                    None
                }
            })
            .map(|url| {
                let depth = if same_authority(&url, page_url) {
                    frame.depth.decrement()
                } else {
                    Depth::CROSS_HOST
                };
                Frame {
                    link: url.into(),
                    parent: frame.link.clone(),
                    depth,
                    check_seen: true,
                }
            })
            .collect()
    }

    /// Keeps the first matching cookies seen for a host
    fn capture_cookies(&mut self, host: String, response: &Response) {
        let name = match &self.session_cookie {
            Some(name) => name,
            None => return,
        };

        if self.cookies.contains_key(&host) {
            return;
        }

        let captured = matching_cookies(response, name);
        if !captured.is_empty() {
            tracing::debug!("Captured session cookie {} for {}", name, host);
            self.cookies.insert(host, captured);
        }
    }

    /// Re-visits links that failed with a transport or server error
    async fn retry_transient_errors(&mut self) {
        let candidates: Vec<Frame> = self
            .errors
            .iter()
            .filter(|(_, record)| record.is_transient())
            .map(|(link, record)| Frame {
                link: link.clone(),
                parent: record.parent_url.clone(),
                depth: record.depth,
                check_seen: false,
            })
            .collect();

        if candidates.is_empty() {
            return;
        }

        let saved = std::mem::replace(&mut self.delay, RETRY_DELAY);
        for frame in candidates {
            tracing::info!("Session {} retrying {}", self.id(), frame.link);
            self.walk(frame).await;
        }
        self.delay = saved;
    }

    /// Blocks while the session is paused
    ///
    /// Wakes on every state change, emits a progress snapshot each heartbeat
    /// and stops the session once the pause outlasts the pause timeout.
    async fn wait_while_paused(&self) {
        let mut state_rx = self.handle.watch_state();
        if *state_rx.borrow_and_update() != SessionState::Paused {
            return;
        }

        tracing::info!("Session {} paused", self.id());

        let heartbeat = self.settings.heartbeat;
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + heartbeat, heartbeat);
        let deadline = tokio::time::sleep(self.settings.pause_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() || *state_rx.borrow_and_update() != SessionState::Paused {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.emit_progress(true).await;
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        "Session {} paused for more than {:?}, stopping",
                        self.id(),
                        self.settings.pause_timeout
                    );
                    self.handle.set_state(SessionState::Stopped);
                    break;
                }
            }
        }

        tracing::info!("Session {} resumed as {}", self.id(), self.handle.state());
    }

    async fn record_success(&mut self, frame: &Frame, http_status: u16) {
        if self.errors.remove(&frame.link).is_some() {
            self.sync_totals();
        }

        let event = self.handle.snapshot(
            EventKind::Success {
                url: frame.link.clone(),
                http_status,
                parent_url: frame.parent.clone(),
            },
            Vec::new(),
        );
        self.handle.emit(event).await;
    }

    async fn record_error(&mut self, frame: &Frame, http_status: u16, message: String) {
        tracing::debug!("{} failed: {}", frame.link, message);

        self.errors.insert(
            frame.link.clone(),
            ErrorRecord {
                http_status,
                message: message.clone(),
                parent_url: frame.parent.clone(),
                depth: frame.depth,
            },
        );
        self.sync_totals();

        let event = self.handle.snapshot(
            EventKind::Failure {
                url: frame.link.clone(),
                http_status,
                message,
                parent_url: frame.parent.clone(),
            },
            Vec::new(),
        );
        self.handle.emit(event).await;
    }

    async fn emit_progress(&self, with_seeds: bool) {
        let seeds = if with_seeds {
            self.seeds.clone()
        } else {
            Vec::new()
        };
        self.handle
            .emit(self.handle.snapshot(EventKind::Progress, seeds))
            .await;
    }

    fn sync_totals(&self) {
        self.handle
            .record_totals(self.visited.len(), self.errors.len());
    }
}

/// Normalized form of a configured URL; unparseable input is kept verbatim
fn normalize(raw: &str) -> String {
    Url::parse(raw.trim())
        .map(|mut url| {
            url.set_fragment(None);
            url.into()
        })
        .unwrap_or_else(|_| raw.to_string())
}

impl std::fmt::Debug for CrawlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlSession")
            .field("id", &self.id())
            .field("state", &self.handle.state())
            .field("seeds", &self.seeds)
            .field("visited", &self.visited.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}
