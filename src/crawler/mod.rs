//! Crawl engine
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and response classification
//! - HTML link extraction
//! - The per-session traversal with pause, cancel, error budget and retries
//! - The session registry and progress fan-out

mod control;
mod event;
mod fetcher;
mod parser;
mod registry;
mod session;

pub use control::SessionHandle;
pub use event::{CrawlEvent, EventKind};
pub use fetcher::{
    build_http_client, classify_response, is_html, request_method, FetchOutcome, StoredCookie,
    CAPTCHA_HEADER, CAPTCHA_MESSAGE,
};
pub use parser::{extract_page_links, PageLinks};
pub use registry::SessionRegistry;
pub use session::{
    CompletedSession, CrawlSession, ErrorRecord, SessionSettings, ERROR_BUDGET, RETRY_DELAY,
};
