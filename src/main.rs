//! blc main entry point
//!
//! This is the command-line interface for the blc broken link checker.

use blc::config::{load_config_with_hash, Config, JobConfig};
use blc::crawler::{CrawlEvent, EventKind, SessionRegistry, SessionSettings};
use blc::output::{Finalizer, ReportStore};
use blc::{BlcError, ConfigError};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// blc: a broken link checker
///
/// blc crawls the configured sites from their seed URLs, follows links to
/// the configured depth and writes a report of every link that failed.
/// Running sessions accept `pause <id>`, `proceed <id>`, `cancel <id>` and
/// `list` on standard input.
#[derive(Parser, Debug)]
#[command(name = "blc")]
#[command(version = "1.0.0")]
#[command(about = "A broken link checker", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Run only the named job (repeatable); all jobs run by default
    #[arg(long = "job", value_name = "NAME")]
    jobs: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print progress events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "list_reports")]
    dry_run: bool,

    /// List stored reports and exit
    #[arg(long, conflicts_with = "dry_run")]
    list_reports: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let jobs = select_jobs(&config, &cli.jobs)?;

    if cli.dry_run {
        handle_dry_run(&config, &jobs);
    } else if cli.list_reports {
        handle_list_reports(&config)?;
    } else {
        handle_crawl(&config, config_hash, jobs, cli.json).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("blc=info,warn"),
            1 => EnvFilter::new("blc=debug,info"),
            2 => EnvFilter::new("blc=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Picks the jobs named on the command line, or all of them
fn select_jobs(config: &Config, names: &[String]) -> Result<Vec<JobConfig>, BlcError> {
    if names.is_empty() {
        return Ok(config.jobs.clone());
    }

    names
        .iter()
        .map(|name| {
            config
                .jobs
                .iter()
                .find(|job| &job.name == name)
                .cloned()
                .ok_or_else(|| {
                    BlcError::Config(ConfigError::Validation(format!(
                        "No job named '{}' in configuration",
                        name
                    )))
                })
        })
        .collect()
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config, jobs: &[JobConfig]) {
    println!("=== blc Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Delay: {}ms", config.crawler.delay_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Pause timeout: {}s", config.crawler.pause_timeout_secs);
    println!("  User agent: {}", config.crawler.user_agent);

    println!("\nReports:");
    println!("  Directory: {}", config.reports.directory);
    println!("  Keep: {}", config.reports.max_reports_to_store);

    println!("\nJobs ({}):", jobs.len());
    for job in jobs {
        println!("  - {} (depth {})", job.name, job.depth());
        for seed in &job.seeds {
            println!("    * {}", seed);
        }
        for excluded in &job.excluded_urls {
            println!("    - {}", excluded);
        }
        if let Some(cookie) = &job.session_cookie {
            println!("    session cookie: {}", cookie);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --list-reports mode
fn handle_list_reports(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = ReportStore::from_config(&config.reports);
    let stamps = store.list()?;

    if stamps.is_empty() {
        println!("No reports in {}", store.directory().display());
    }
    for stamp in stamps {
        println!("{}", stamp);
    }

    Ok(())
}

/// Runs every selected job as its own session until all are finalized
async fn handle_crawl(
    config: &Config,
    config_hash: String,
    jobs: Vec<JobConfig>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if jobs.is_empty() {
        tracing::warn!("No jobs configured, nothing to crawl");
        return Ok(());
    }

    let (done_tx, done_rx) = mpsc::channel(jobs.len());
    let registry = Arc::new(SessionRegistry::new(
        SessionSettings::from_config(&config.crawler),
        config.crawler.event_buffer,
        done_tx,
    ));

    let finalizer = Finalizer::new(
        Arc::clone(&registry),
        ReportStore::from_config(&config.reports),
    )
    .with_config_hash(config_hash);
    let mut finalized = finalizer.subscribe();
    tokio::spawn(finalizer.run(done_rx));

    for job in &jobs {
        let session = registry.create()?;
        let id = session.id();
        let events = registry.subscribe(id, config.crawler.event_buffer)?;
        tokio::spawn(log_events(job.name.clone(), events, json));

        tracing::info!(
            "Starting job '{}' as session {} ({} seeds)",
            job.name,
            id,
            job.seeds.len()
        );
        tokio::spawn(session.scan(
            job.seeds.clone(),
            job.depth(),
            job.session_cookie.clone(),
            job.excluded_urls.clone(),
        ));
    }

    let total = jobs.len() as u64;
    let mut commands = spawn_stdin_reader();

    loop {
        tokio::select! {
            result = finalized.wait_for(|count| *count >= total) => {
                result?;
                break;
            }
            Some(line) = commands.recv() => {
                handle_command_line(&registry, &line).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, cancelling all sessions");
                for id in registry.ids() {
                    if let Err(e) = registry.command(id, "cancel").await {
                        tracing::warn!("Failed to cancel session {}: {}", id, e);
                    }
                }
            }
        }
    }

    tracing::info!("All sessions finished");
    Ok(())
}

/// Reads operator commands from stdin on a dedicated thread
///
/// A blocked stdin read must not keep the runtime alive at shutdown, so the
/// reader is a plain thread rather than a runtime task.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Applies one `<command> <session id>` line, or `list`
async fn handle_command_line(registry: &SessionRegistry, line: &str) {
    let mut parts = line.split_whitespace();

    match (parts.next(), parts.next()) {
        (None, _) => {}
        (Some(word), _) if word.eq_ignore_ascii_case("list") => {
            for id in registry.ids() {
                if let Some(handle) = registry.get(id) {
                    println!(
                        "session {}: {}, {} visited, {} errors",
                        id,
                        handle.state(),
                        handle.total_visited(),
                        handle.total_errors()
                    );
                }
            }
        }
        (Some(command), Some(id)) => match id.parse::<u64>() {
            Ok(id) => match registry.command(id, command).await {
                Ok(state) => tracing::info!("Session {} is now {}", id, state),
                Err(e) => tracing::warn!("{}", e),
            },
            Err(_) => tracing::warn!("Invalid session id '{}'", id),
        },
        (Some(command), None) => tracing::warn!("Usage: {} <session id>", command),
    }
}

/// Logs a session's progress stream until it closes
async fn log_events(job: String, mut events: mpsc::Receiver<CrawlEvent>, json: bool) {
    while let Some(event) = events.recv().await {
        if json {
            match event.to_json() {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to encode event: {}", e),
            }
            continue;
        }

        match &event.kind {
            EventKind::Success {
                url, http_status, ..
            } => tracing::debug!("[{}] {} {}", job, http_status, url),
            EventKind::Failure {
                url,
                http_status,
                message,
                parent_url,
            } => tracing::warn!(
                "[{}] {} ({}) {} found on {}",
                job,
                url,
                http_status,
                message,
                parent_url
            ),
            EventKind::StateChanged { command } => tracing::info!(
                "[{}] session {} received {}, now {}",
                job,
                event.session_id,
                command,
                event.state
            ),
            EventKind::Progress => tracing::info!(
                "[{}] session {} {}: {} visited, {} errors",
                job,
                event.session_id,
                event.state,
                event.total_visited,
                event.total_errors
            ),
            EventKind::Completed => tracing::info!(
                "[{}] session {} finalized: {} visited, {} errors",
                job,
                event.session_id,
                event.total_visited,
                event.total_errors
            ),
        }
    }
}
