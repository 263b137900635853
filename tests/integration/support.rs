use blc::crawler::{CompletedSession, CrawlEvent, CrawlSession, SessionSettings};
use blc::Depth;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::ResponseTemplate;

/// Settings with no politeness delay and short timers
pub fn test_settings() -> SessionSettings {
    SessionSettings {
        delay: Duration::ZERO,
        request_timeout: Duration::from_secs(5),
        pause_timeout: Duration::from_secs(30),
        heartbeat: Duration::from_millis(100),
        ..SessionSettings::default()
    }
}

/// A standalone session plus the receiving ends of its channels
pub struct TestSession {
    pub session: CrawlSession,
    pub events: mpsc::Receiver<CrawlEvent>,
    pub done: mpsc::Receiver<CompletedSession>,
}

pub fn test_session(settings: SessionSettings) -> TestSession {
    let (events_tx, events) = mpsc::channel(256);
    let (done_tx, done) = mpsc::channel(1);
    let session =
        CrawlSession::new(1, settings, events_tx, done_tx).expect("Failed to build session");
    TestSession {
        session,
        events,
        done,
    }
}

/// Runs a session to completion without listening to its events
pub async fn crawl(
    seeds: Vec<String>,
    depth: Depth,
    session_cookie: Option<&str>,
    excluded: Vec<String>,
) -> CompletedSession {
    let TestSession {
        session,
        events,
        mut done,
    } = test_session(test_settings());
    drop(events);

    session
        .scan(
            seeds,
            depth,
            session_cookie.map(String::from),
            excluded,
        )
        .await;

    done.recv().await.expect("Session did not complete")
}

/// An HTML page response
pub fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

/// An HTML page holding one anchor per href
pub fn page_linking(hrefs: &[String]) -> ResponseTemplate {
    let anchors: String = hrefs
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    html(format!("<html><body>{}</body></html>", anchors))
}
