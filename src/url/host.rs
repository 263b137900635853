use url::{Position, Url};

/// Extracts the lowercase host name of a URL, without the port
///
/// Captured session cookies are keyed by this value.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use blc::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM:8443/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the authority of a URL as `host[:port]`
///
/// Two links are on the same host for traversal purposes only when their
/// authorities are equal, so `example.com` and `example.com:8080` are
/// different hosts. Default ports are omitted by the url crate, which makes
/// `http://example.com:80/` and `http://example.com/` equal.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use blc::url::authority;
///
/// let url = Url::parse("http://127.0.0.1:8080/a?b").unwrap();
/// assert_eq!(authority(&url), "127.0.0.1:8080");
/// ```
pub fn authority(url: &Url) -> &str {
    &url[Position::BeforeHost..Position::AfterPort]
}

/// Returns true if both URLs point at the same host and port
pub fn same_authority(a: &Url, b: &Url) -> bool {
    authority(a) == authority(b)
}
