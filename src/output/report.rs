//! JSON and CSV report files
//!
//! Reports are named after the time the session finished:
//! `report-YYYY-MM-DD-HH-MM-SS.json`, plus a `.csv` with the same stamp when
//! the session recorded errors.

use crate::config::ReportsConfig;
use crate::crawler::{CompletedSession, ErrorRecord};
use crate::output::{OutputError, OutputResult};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stamp format used in report file names
pub const FILE_STAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Stamp format shown to users and accepted by [`ReportStore::load`]
pub const DISPLAY_STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CSV_HEADER: [&str; 4] = ["URL", "HTTP code", "Error", "Parent URL"];

/// Persisted summary of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub session_id: u64,
    pub time_elapsed_ms: u64,
    pub time_finished: DateTime<Local>,
    /// Number of links fetched
    pub total_links: usize,
    /// Seed URLs of the session
    pub urls: Vec<String>,
    pub errors: BTreeMap<String, ErrorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

impl ReportData {
    pub fn from_session(session: &CompletedSession) -> Self {
        Self {
            session_id: session.id,
            time_elapsed_ms: u64::try_from(session.elapsed.as_millis()).unwrap_or(u64::MAX),
            time_finished: session.finished_at,
            total_links: session.visited.len(),
            urls: session.seeds.clone(),
            errors: session.errors.clone(),
            config_hash: None,
        }
    }

    /// Error table as CSV, or `None` when there is nothing to report
    pub fn to_csv(&self) -> OutputResult<Option<String>> {
        if self.errors.is_empty() {
            return Ok(None);
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for (url, error) in &self.errors {
            writer.write_record([
                url.as_str(),
                error.http_status.to_string().as_str(),
                error.message.as_str(),
                error.parent_url.as_str(),
            ])?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        let csv = String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        Ok(Some(csv))
    }
}

/// Paths written for one report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedReport {
    /// Display stamp, usable with [`ReportStore::load`]
    pub stamp: String,
    pub json_path: PathBuf,
    pub csv_path: Option<PathBuf>,
}

/// Directory of stored reports with a retention limit
#[derive(Debug, Clone)]
pub struct ReportStore {
    directory: PathBuf,
    max_reports: usize,
}

impl ReportStore {
    pub fn new(directory: impl Into<PathBuf>, max_reports: usize) -> Self {
        Self {
            directory: directory.into(),
            max_reports,
        }
    }

    pub fn from_config(config: &ReportsConfig) -> Self {
        Self::new(&config.directory, config.max_reports_to_store)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes the JSON report and, if there are errors, the CSV report
    ///
    /// When a report with the same stamp already exists the stamp is moved
    /// forward one second at a time until it is free.
    pub fn save(&self, report: &ReportData) -> OutputResult<SavedReport> {
        fs::create_dir_all(&self.directory)?;

        let mut finished = report.time_finished.naive_local();
        while self.json_path(&finished).exists() {
            finished += chrono::Duration::seconds(1);
        }

        let json_path = self.json_path(&finished);
        fs::write(&json_path, serde_json::to_string_pretty(report)?)?;

        let csv_path = match report.to_csv()? {
            Some(csv) => {
                let path = self.file_path(&finished, "csv");
                fs::write(&path, csv)?;
                Some(path)
            }
            None => None,
        };

        Ok(SavedReport {
            stamp: finished.format(DISPLAY_STAMP_FORMAT).to_string(),
            json_path,
            csv_path,
        })
    }

    /// Stamps of stored JSON reports, newest first
    pub fn list(&self) -> OutputResult<Vec<String>> {
        let stamps = self.stamps(&["json"])?;
        Ok(stamps
            .iter()
            .rev()
            .map(|s| s.format(DISPLAY_STAMP_FORMAT).to_string())
            .collect())
    }

    /// Loads the report with the given display stamp
    pub fn load(&self, stamp: &str) -> OutputResult<ReportData> {
        let finished = NaiveDateTime::parse_from_str(stamp.trim(), DISPLAY_STAMP_FORMAT)
            .map_err(|_| OutputError::InvalidStamp(stamp.to_string()))?;

        let content = match fs::read_to_string(self.json_path(&finished)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(OutputError::NotFound(stamp.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&content)?)
    }

    /// Deletes all but the most recent reports
    ///
    /// A report's JSON and CSV files share a stamp and are kept or removed
    /// together. Returns the number of files deleted.
    pub fn prune(&self) -> OutputResult<usize> {
        let stamps = self.stamps(&["json", "csv"])?;
        let mut removed = 0;

        for stamp in stamps.iter().rev().skip(self.max_reports) {
            for extension in ["json", "csv"] {
                match fs::remove_file(self.file_path(stamp, extension)) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if removed > 0 {
            tracing::debug!("Pruned {} report files", removed);
        }
        Ok(removed)
    }

    /// Stamps of report files with any of the given extensions, ascending
    fn stamps(&self, extensions: &[&str]) -> OutputResult<BTreeSet<NaiveDateTime>> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut stamps = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name();
            let stamp = name.to_str().and_then(|name| {
                extensions.iter().find_map(|ext| {
                    name.strip_prefix("report-")?
                        .strip_suffix(ext)?
                        .strip_suffix('.')
                })
            });

            if let Some(parsed) =
                stamp.and_then(|s| NaiveDateTime::parse_from_str(s, FILE_STAMP_FORMAT).ok())
            {
                stamps.insert(parsed);
            }
        }

        Ok(stamps)
    }

    fn json_path(&self, stamp: &NaiveDateTime) -> PathBuf {
        self.file_path(stamp, "json")
    }

    fn file_path(&self, stamp: &NaiveDateTime, extension: &str) -> PathBuf {
        self.directory.join(format!(
            "report-{}.{}",
            stamp.format(FILE_STAMP_FORMAT),
            extension
        ))
    }
}
