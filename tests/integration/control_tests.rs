//! Pause, proceed and cancel while a session is running

use crate::support::{html, page_linking, test_session, test_settings, TestSession};
use blc::crawler::{CrawlEvent, EventKind, SessionSettings};
use blc::{BlcError, Depth, SessionState};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

/// A site whose front page answers slowly and links to two more pages
async fn slow_site() -> MockServer {
    let server = MockServer::start().await;
    let base_url = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            page_linking(&[format!("{}/a", base_url), format!("{}/b", base_url)])
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(html("<html></html>"))
        .mount(&server)
        .await;

    server
}

async fn next_event(events: &mut mpsc::Receiver<CrawlEvent>) -> CrawlEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Event stream closed")
}

fn drain(events: &mut mpsc::Receiver<CrawlEvent>) -> Vec<CrawlEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[tokio::test]
async fn test_pause_holds_traversal_until_proceed() {
    let server = slow_site().await;
    let TestSession {
        session,
        mut events,
        mut done,
    } = test_session(test_settings());
    let handle = session.handle();

    tokio::spawn(session.scan(
        vec![format!("{}/", server.uri())],
        Depth::Limited(2),
        None,
        vec![],
    ));

    let started = next_event(&mut events).await;
    assert_eq!(started.state, SessionState::InProgress);

    assert_eq!(handle.command("pause").await.unwrap(), SessionState::Paused);
    sleep(Duration::from_millis(500)).await;

    // At most the seed was in flight when the pause landed
    let requests = server.received_requests().await.unwrap();
    assert!(requests.len() <= 1, "fetched {} while paused", requests.len());
    assert_eq!(handle.state(), SessionState::Paused);

    let paused_events = drain(&mut events);
    assert!(paused_events
        .iter()
        .any(|e| e.kind == EventKind::Progress && e.state == SessionState::Paused));

    assert_eq!(
        handle.command("proceed").await.unwrap(),
        SessionState::InProgress
    );

    let completed = timeout(Duration::from_secs(5), done.recv())
        .await
        .expect("Session did not finish")
        .unwrap();
    assert_eq!(completed.visited.len(), 3);
    assert_eq!(completed.handle.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_cancel_ends_session_early() {
    let server = slow_site().await;
    let TestSession {
        session,
        mut events,
        mut done,
    } = test_session(test_settings());
    let handle = session.handle();

    tokio::spawn(session.scan(
        vec![format!("{}/", server.uri())],
        Depth::Limited(2),
        None,
        vec![],
    ));

    next_event(&mut events).await;
    handle.command("pause").await.unwrap();
    assert_eq!(handle.command("CANCEL").await.unwrap(), SessionState::Stopped);

    let completed = timeout(Duration::from_secs(5), done.recv())
        .await
        .expect("Session did not finish")
        .unwrap();
    assert!(completed.visited.len() <= 1);
    assert_eq!(completed.handle.state(), SessionState::Stopped);

    let changes: Vec<EventKind> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::StateChanged { .. }))
        .map(|e| e.kind)
        .collect();
    assert_eq!(changes.len(), 2);
}

#[tokio::test]
async fn test_pause_timeout_stops_session() {
    let server = slow_site().await;
    let settings = SessionSettings {
        pause_timeout: Duration::from_millis(300),
        heartbeat: Duration::from_millis(50),
        ..test_settings()
    };
    let TestSession {
        session,
        mut events,
        mut done,
    } = test_session(settings);
    let handle = session.handle();

    tokio::spawn(session.scan(
        vec![format!("{}/", server.uri())],
        Depth::Limited(2),
        None,
        vec![],
    ));

    next_event(&mut events).await;
    handle.command("pause").await.unwrap();

    // Nobody resumes; the session stops itself
    let completed = timeout(Duration::from_secs(5), done.recv())
        .await
        .expect("Paused session was not stopped")
        .unwrap();
    assert!(completed.visited.len() <= 1);
    assert_eq!(completed.handle.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_unknown_command_is_rejected() {
    let TestSession { session, .. } = test_session(test_settings());
    let handle = session.handle();

    let result = handle.command("rewind").await;
    assert!(matches!(result, Err(BlcError::UnknownCommand(name)) if name == "rewind"));
    assert_eq!(handle.state(), SessionState::Stopped);
    assert_eq!(handle.pending_command(), None);
}

#[tokio::test]
async fn test_commands_before_start_do_not_start_session() {
    let TestSession { session, .. } = test_session(test_settings());
    let handle = session.handle();

    assert_eq!(handle.command("proceed").await.unwrap(), SessionState::Stopped);
    assert_eq!(handle.command("pause").await.unwrap(), SessionState::Stopped);
}
