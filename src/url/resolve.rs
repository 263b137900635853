use crate::UrlError;
use url::{ParseError, Url};

/// Resolves a link found on a page into an absolute, fragment-free URL
///
/// # Resolution Rules
///
/// The effective base is `declared_base` when the page carries a `<base href>`,
/// otherwise the page URL itself.
///
/// 1. Absolute link (has a scheme): returned as is
/// 2. `//host/path`: inherits the scheme of the effective base
/// 3. `/path`: inherits scheme, host and port of the effective base
/// 4. Anything else is relative to the directory of the effective base path:
///    the base path is cleaned, its last segment dropped, and the cleaned
///    relative path appended. The link's own query string is kept.
///
/// The fragment is always removed.
///
/// # Arguments
///
/// * `raw` - The attribute value as it appears in the document
/// * `page_url` - The URL the document was fetched from
/// * `declared_base` - The resolved `<base href>` of the document, if any
///
/// # Returns
///
/// * `Ok(Url)` - The absolute URL
/// * `Err(UrlError)` - The link cannot be turned into a URL
///
/// # Examples
///
/// ```
/// use blc::url::resolve_link;
/// use url::Url;
///
/// let page = Url::parse("http://host/test/index.html").unwrap();
/// let base = Url::parse("http://host/test/sub/").unwrap();
///
/// let url = resolve_link("bar.html", &page, None).unwrap();
/// assert_eq!(url.as_str(), "http://host/test/bar.html");
///
/// let url = resolve_link("bar.html", &page, Some(&base)).unwrap();
/// assert_eq!(url.as_str(), "http://host/test/sub/bar.html");
/// ```
pub fn resolve_link(
    raw: &str,
    page_url: &Url,
    declared_base: Option<&Url>,
) -> Result<Url, UrlError> {
    let raw = raw.trim();
    let base = declared_base.unwrap_or(page_url);

    let mut url = match Url::parse(raw) {
        Ok(absolute) => absolute,
        Err(ParseError::RelativeUrlWithoutBase) => resolve_relative(raw, base)?,
        Err(e) => return Err(UrlError::Parse(e.to_string())),
    };

    url.set_fragment(None);
    Ok(url)
}

/// Resolves a link that has no scheme of its own
fn resolve_relative(raw: &str, base: &Url) -> Result<Url, UrlError> {
    if raw.starts_with("//") {
        return Url::parse(&format!("{}:{}", base.scheme(), raw))
            .map_err(|e| UrlError::Parse(e.to_string()));
    }

    if raw.starts_with('/') {
        return base.join(raw).map_err(|e| UrlError::Parse(e.to_string()));
    }

    if base.cannot_be_a_base() {
        return Err(UrlError::InvalidScheme(base.scheme().to_string()));
    }

    let without_fragment = raw.split('#').next().unwrap_or_default();
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    };

    let relative = match clean_path(path).as_str() {
        "." => String::new(),
        cleaned => cleaned.to_string(),
    };
    let directory = parent_dir(base.path());
    let joined = format!("{}/{}", directory.trim_end_matches('/'), relative);

    let mut url = base.clone();
    url.set_path(&joined);
    url.set_query(query);
    Ok(url)
}

/// Returns the directory portion of a path: everything up to the last slash,
/// cleaned
fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => clean_path(&path[..=idx]),
        None => ".".to_string(),
    }
}

/// Lexically cleans a slash-separated path
///
/// Repeated slashes and `.` segments are dropped, `..` removes the preceding
/// segment where one exists, and a trailing slash is not kept. An empty
/// result is `.` for relative paths and `/` for rooted ones. `..` segments
/// that climb above a relative path's start are preserved.
fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.last().map_or(false, |last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            _ => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
