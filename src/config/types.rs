use crate::state::Depth;
use serde::Deserialize;

/// Default browser-like User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.104 Safari/537.36";

/// Main configuration structure for blc
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub reports: ReportsConfig,
    #[serde(default, rename = "job")]
    pub jobs: Vec<JobConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Politeness delay before every fetch (milliseconds)
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// A session left paused this long is stopped (seconds)
    #[serde(rename = "pause-timeout-secs", default = "default_pause_timeout")]
    pub pause_timeout_secs: u64,

    /// Interval between progress snapshots while paused (seconds)
    #[serde(rename = "heartbeat-secs", default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    /// Capacity of each session's progress stream
    #[serde(rename = "event-buffer", default = "default_event_buffer")]
    pub event_buffer: usize,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Report output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReportsConfig {
    /// Directory where JSON and CSV reports are written
    pub directory: String,

    /// Number of most recent reports kept; older ones are deleted
    #[serde(rename = "max-reports-to-store")]
    pub max_reports_to_store: usize,
}

/// A preconfigured crawl
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub name: String,

    /// Seed URLs, crawled in order
    pub seeds: Vec<String>,

    /// Traversal depth; any negative value means unlimited
    pub depth: i64,

    /// Name of the session cookie to capture per host
    #[serde(rename = "session-cookie", default)]
    pub session_cookie: Option<String>,

    /// URLs that are never fetched even when discovered
    #[serde(rename = "excluded-urls", default)]
    pub excluded_urls: Vec<String>,
}

impl JobConfig {
    pub fn depth(&self) -> Depth {
        Depth::from_signed(self.depth)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            delay_ms: 100,
            request_timeout_secs: default_request_timeout(),
            pause_timeout_secs: default_pause_timeout(),
            heartbeat_secs: default_heartbeat(),
            event_buffer: default_event_buffer(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_request_timeout() -> u64 {
    15
}

fn default_pause_timeout() -> u64 {
    3600
}

fn default_heartbeat() -> u64 {
    5
}

fn default_event_buffer() -> usize {
    1
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
