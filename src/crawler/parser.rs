//! HTML link extraction
//!
//! This module scans a parsed page for link-bearing attributes:
//! - `href` on `<a>`, `<link>` and `<base>`
//! - `src` on `<script>`, `<img>` and `<iframe>`
//!
//! Resolution is left to [`crate::url::resolve_link`]; this module only
//! returns the raw attribute values and the page's declared base.

use scraper::{Html, Selector};

/// Tags and attributes that carry fetchable links
const LINK_SELECTOR: &str =
    "a[href], link[href], base[href], script[src], img[src], iframe[src]";

/// Schemes that never point at a fetchable resource
const REJECTED_SCHEMES: &[&str] = &["tel:", "mailto:", "javascript:"];

/// Raw links found on a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    /// Distinct candidate links in document order
    pub links: Vec<String>,

    /// Value of the first `<base href>`, overriding the page URL
    pub declared_base: Option<String>,
}

/// Extracts candidate links and the declared base from an HTML document
///
/// Empty attributes and `tel:`, `mailto:` or `javascript:` targets are
/// skipped. Duplicates keep their first position.
///
/// # Example
///
/// ```
/// use blc::crawler::extract_page_links;
///
/// let html = r#"<base href="/sub/"><a href="a.html">A</a><img src="a.html">"#;
/// let page = extract_page_links(html);
/// assert_eq!(page.declared_base.as_deref(), Some("/sub/"));
/// assert_eq!(page.links, vec!["/sub/", "a.html"]);
/// ```
pub fn extract_page_links(html: &str) -> PageLinks {
    let document = Html::parse_document(html);
    let mut page = PageLinks::default();

    let selector = match Selector::parse(LINK_SELECTOR) {
        Ok(selector) => selector,
        Err(_) => return page,
    };

    for element in document.select(&selector) {
        let element = element.value();
        let is_base = element.name() == "base";
        let raw = match element.attr("href").or_else(|| element.attr("src")) {
            Some(raw) => raw.trim(),
            None => continue,
        };

        if raw.is_empty() || has_rejected_scheme(raw) {
            continue;
        }

        if is_base && page.declared_base.is_none() {
            page.declared_base = Some(raw.to_string());
        }

        if !page.links.iter().any(|seen| seen == raw) {
            page.links.push(raw.to_string());
        }
    }

    page
}

fn has_rejected_scheme(link: &str) -> bool {
    let lower = link.to_ascii_lowercase();
    REJECTED_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}
