//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the per-session HTTP client
//! - Choosing GET for page-like URLs and HEAD for everything else
//! - Attaching captured session cookies
//! - Classifying responses into reachable / challenged / failed

use crate::crawler::session::SessionSettings;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method, Response, StatusCode};
use url::Url;

/// Response header set by the CAPTCHA challenge page of a protecting proxy
pub const CAPTCHA_HEADER: &str = "cf-chl-bypass";

/// Message recorded for links hidden behind a CAPTCHA challenge
pub const CAPTCHA_MESSAGE: &str = "Protected by CAPTCHA challenge";

/// Path extensions that are downloaded and parsed for further links
const PAGE_EXTENSIONS: &[&str] = &["", ".html", ".htm", ".asp", ".aspx"];

/// A cookie captured from a response and replayed to the same host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
}

/// Classification of an HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The link answered; 1xx-3xx, 400 and 418 all count as reachable
    Reachable { status_code: u16 },

    /// A 403 carrying the CAPTCHA challenge marker
    Challenged { status_code: u16 },

    /// Status above 400 (other than 418)
    HttpError { status_code: u16, reason: String },
}

impl FetchOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable { .. })
    }
}

/// Builds the HTTP client shared by every request of a session
///
/// Certificate verification is disabled: the crawler reports on sites with
/// self-signed or expired certificates rather than refusing them.
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(settings: &SessionSettings) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .default_headers(headers)
        .timeout(settings.request_timeout)
        .danger_accept_invalid_certs(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Chooses the request method for a link
///
/// Page-like URLs (no extension, or `.html`, `.htm`, `.asp`, `.aspx`) are
/// fetched with GET so they can be parsed; everything else only needs an
/// existence check, so HEAD avoids downloading large assets.
///
/// # Examples
///
/// ```
/// use blc::crawler::request_method;
/// use reqwest::Method;
/// use url::Url;
///
/// let page = Url::parse("http://host/docs/").unwrap();
/// let image = Url::parse("http://host/logo.png").unwrap();
/// assert_eq!(request_method(&page), Method::GET);
/// assert_eq!(request_method(&image), Method::HEAD);
/// ```
pub fn request_method(url: &Url) -> Method {
    let extension = path_extension(url.path()).to_ascii_lowercase();
    if PAGE_EXTENSIONS.contains(&extension.as_str()) {
        Method::GET
    } else {
        Method::HEAD
    }
}

/// Returns the extension of the last path segment, including the dot
fn path_extension(path: &str) -> &str {
    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rfind('.') {
        Some(idx) => &segment[idx..],
        None => "",
    }
}

/// Sends a request for `url`, replaying any cookies captured for its host
pub async fn send_request(
    client: &Client,
    method: Method,
    url: &Url,
    cookies: &[StoredCookie],
) -> Result<Response, reqwest::Error> {
    let mut request = client.request(method, url.clone());

    if !cookies.is_empty() {
        let header = cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        request = request.header(COOKIE, header);
    }

    request.send().await
}

/// Classifies a response by status code and headers
///
/// # Rules
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | 403 with CAPTCHA marker header | Challenged |
/// | status > 400, not 418 | HttpError |
/// | anything else | Reachable |
pub fn classify_response(status: StatusCode, headers: &HeaderMap) -> FetchOutcome {
    let status_code = status.as_u16();

    if status == StatusCode::FORBIDDEN && has_captcha_marker(headers) {
        return FetchOutcome::Challenged { status_code };
    }

    if status_code > 400 && status != StatusCode::IM_A_TEAPOT {
        return FetchOutcome::HttpError {
            status_code,
            reason: status.to_string(),
        };
    }

    FetchOutcome::Reachable { status_code }
}

fn has_captcha_marker(headers: &HeaderMap) -> bool {
    headers
        .get(CAPTCHA_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "1")
        .unwrap_or(false)
}

/// Returns true if the response declares an HTML body
pub fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false)
}

/// Collects the response cookies named `name`
pub fn matching_cookies(response: &Response, name: &str) -> Vec<StoredCookie> {
    response
        .cookies()
        .filter(|c| c.name() == name)
        .map(|c| StoredCookie {
            name: c.name().to_string(),
            value: c.value().to_string(),
        })
        .collect()
}
