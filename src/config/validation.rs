use crate::config::types::{Config, CrawlerConfig, JobConfig, ReportsConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Maximum politeness delay accepted (one minute)
const MAX_DELAY_MS: u64 = 60_000;

/// Maximum number of preconfigured jobs
const MAX_JOBS: usize = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_reports_config(&config.reports)?;
    validate_jobs(&config.jobs)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.delay_ms > MAX_DELAY_MS {
        return Err(ConfigError::Validation(format!(
            "delay-ms must be <= {}ms, got {}ms",
            MAX_DELAY_MS, config.delay_ms
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.pause_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "pause-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.heartbeat_secs < 1 {
        return Err(ConfigError::Validation(
            "heartbeat-secs must be >= 1".to_string(),
        ));
    }

    if config.event_buffer < 1 {
        return Err(ConfigError::Validation(
            "event-buffer must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates report output configuration
fn validate_reports_config(config: &ReportsConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "reports directory cannot be empty".to_string(),
        ));
    }

    if config.max_reports_to_store < 1 {
        return Err(ConfigError::Validation(format!(
            "max-reports-to-store must be >= 1, got {}",
            config.max_reports_to_store
        )));
    }

    Ok(())
}

/// Validates job entries
fn validate_jobs(jobs: &[JobConfig]) -> Result<(), ConfigError> {
    if jobs.len() > MAX_JOBS {
        return Err(ConfigError::Validation(format!(
            "at most {} jobs are allowed, got {}",
            MAX_JOBS,
            jobs.len()
        )));
    }

    let mut names = HashSet::new();
    for job in jobs {
        if job.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "job name cannot be empty".to_string(),
            ));
        }

        if !names.insert(job.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate job name '{}'",
                job.name
            )));
        }

        if job.seeds.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Job '{}' must have at least one seed URL",
                job.name
            )));
        }

        for seed in &job.seeds {
            validate_http_url(seed, "seed")?;
        }

        for excluded in &job.excluded_urls {
            validate_http_url(excluded, "excluded")?;
        }

        if let Some(cookie) = &job.session_cookie {
            if cookie.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Job '{}' has an empty session-cookie name",
                    job.name
                )));
            }
        }
    }

    Ok(())
}

/// Validates that a string is an absolute http(s) URL
fn validate_http_url(value: &str, kind: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} URL '{}': {}", kind, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} URL '{}' must use http or https",
            kind, value
        )));
    }

    Ok(())
}
