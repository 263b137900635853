//! Registry, finalizer and report store working together

use crate::support::{page_linking, test_settings};
use blc::config::{load_config_with_hash, parse_config};
use blc::crawler::{EventKind, SessionRegistry};
use blc::output::{Finalizer, ReportStore};
use blc::{Depth, SessionState};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

#[tokio::test]
async fn test_finished_sessions_are_reported_and_deregistered() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_linking(&[
            format!("{}/missing", base_url),
            format!("{}/also,missing", base_url),
        ]))
        .mount(&server)
        .await;

    let reports = TempDir::new().unwrap();
    let (done_tx, done_rx) = mpsc::channel(2);
    let registry = Arc::new(SessionRegistry::new(test_settings(), 1, done_tx));

    let finalizer = Finalizer::new(
        Arc::clone(&registry),
        ReportStore::new(reports.path(), 10),
    );
    let mut finalized = finalizer.subscribe();
    tokio::spawn(finalizer.run(done_rx));

    let session = registry.create().unwrap();
    let id = session.id();
    let mut events = registry.subscribe(id, 64).unwrap();
    tokio::spawn(session.scan(
        vec![format!("{}/", base_url)],
        Depth::Limited(2),
        None,
        vec![],
    ));

    timeout(Duration::from_secs(10), finalized.wait_for(|n| *n == 1))
        .await
        .expect("Session was not finalized")
        .unwrap();
    assert!(registry.is_empty());

    let mut received = Vec::new();
    while let Some(event) = events.recv().await {
        received.push(event);
    }

    let failures = received
        .iter()
        .filter(|e| e.fetched_ok() == Some(false))
        .count();
    assert_eq!(failures, 2);

    // Completion comes strictly after every progress event
    let last = received.last().unwrap();
    assert_eq!(last.kind, EventKind::Completed);
    assert_eq!(last.state, SessionState::Stopped);
    assert_eq!(last.seed_urls, vec![format!("{}/", base_url)]);
    assert_eq!(last.total_visited, 3);
    assert_eq!(last.total_errors, 2);

    let store = ReportStore::new(reports.path(), 10);
    let stamps = store.list().unwrap();
    assert_eq!(stamps.len(), 1);

    let report = store.load(&stamps[0]).unwrap();
    assert_eq!(report.total_links, 3);
    assert_eq!(report.urls, vec![format!("{}/", base_url)]);
    assert_eq!(report.errors.len(), 2);

    let csv_name = format!(
        "report-{}.csv",
        stamps[0].replace(' ', "-").replace(':', "-")
    );
    let csv = std::fs::read_to_string(reports.path().join(csv_name)).unwrap();
    assert!(csv.starts_with("URL,HTTP code,Error,Parent URL\n"));
    assert!(csv.contains(&format!("\"{}/also,missing\",404", base_url)));
}

#[tokio::test]
async fn test_sessions_run_concurrently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(page_linking(&[]))
        .mount(&server)
        .await;

    let reports = TempDir::new().unwrap();
    let (done_tx, done_rx) = mpsc::channel(4);
    let registry = Arc::new(SessionRegistry::new(test_settings(), 4, done_tx));
    let finalizer = Finalizer::new(Arc::clone(&registry), ReportStore::new(reports.path(), 1));
    let mut finalized = finalizer.subscribe();
    tokio::spawn(finalizer.run(done_rx));

    for name in ["one", "two", "three"] {
        let session = registry.create().unwrap();
        tokio::spawn(session.scan(
            vec![format!("{}/{}", server.uri(), name)],
            Depth::Limited(1),
            None,
            vec![],
        ));
    }
    assert_eq!(registry.ids(), vec![1, 2, 3]);

    timeout(Duration::from_secs(10), finalized.wait_for(|n| *n == 3))
        .await
        .expect("Sessions were not finalized")
        .unwrap();
    assert!(registry.is_empty());

    // Retention of one report
    let store = ReportStore::new(reports.path(), 1);
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn test_config_file_drives_jobs() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("blc.toml");
    std::fs::write(
        &config_path,
        r#"
[crawler]
delay-ms = 0

[reports]
directory = "./reports"
max-reports-to-store = 3

[[job]]
name = "docs"
seeds = ["https://example.com/docs/"]
depth = -1
session-cookie = "sid"
excluded-urls = ["https://example.com/docs/private"]

[[job]]
name = "blog"
seeds = ["https://example.com/blog/", "https://example.com/news/"]
depth = 2
"#,
    )
    .unwrap();

    let (config, hash) = load_config_with_hash(&config_path).unwrap();
    assert_eq!(hash.len(), 64);
    assert_eq!(config.jobs.len(), 2);
    assert_eq!(config.jobs[0].depth(), Depth::Unlimited);
    assert_eq!(config.jobs[1].depth(), Depth::Limited(2));
    assert_eq!(config.crawler.request_timeout_secs, 15);

    let invalid = r#"
[crawler]
delay-ms = 0

[reports]
directory = "./reports"
max-reports-to-store = 3

[[job]]
name = "empty"
seeds = []
depth = 1
"#;
    assert!(parse_config(invalid).is_err());
}
