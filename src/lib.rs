//! blc: a broken-link-checking web crawler
//!
//! This crate walks a site from one or more seed URLs, follows hyperlinks up
//! to a configurable depth, and records which resources answered and which
//! failed. Each crawl run is a [`crawler::CrawlSession`] that can be paused,
//! resumed or cancelled while it runs, and that streams its progress as
//! [`crawler::CrawlEvent`]s.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for blc operations
#[derive(Debug, Error)]
pub enum BlcError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Unknown crawler command: {0}")]
    UnknownCommand(String),

    #[error("Session {0} not found")]
    UnknownSession(u64),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Report error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),
}

/// Result type alias for blc operations
pub type Result<T> = std::result::Result<T, BlcError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEvent, CrawlSession, SessionHandle, SessionRegistry};
pub use state::{Command, Depth, SessionState};
pub use self::url::resolve_link;
