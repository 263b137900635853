//! URL handling module for blc
//!
//! This module resolves links discovered on a page into absolute URLs and
//! provides the host comparisons the traversal uses for cross-host
//! truncation and cookie scoping.

mod host;
mod resolve;

// Re-export main functions
pub use host::{authority, extract_host, same_authority};
pub use resolve::resolve_link;
