//! Output module for crawl reports
//!
//! This module handles:
//! - Writing JSON and CSV reports of finished sessions
//! - Listing, loading and pruning stored reports
//! - The finalizer task that turns completed sessions into reports

mod finalizer;
mod report;

pub use finalizer::Finalizer;
pub use report::{ReportData, ReportStore, SavedReport, DISPLAY_STAMP_FORMAT, FILE_STAMP_FORMAT};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write CSV report: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid report stamp '{0}'")]
    InvalidStamp(String),

    #[error("Report {0} not found")]
    NotFound(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
