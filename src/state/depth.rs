use serde::{Deserialize, Serialize};
use std::fmt;

/// Remaining traversal budget for a link
///
/// A node is fetched while its budget is at least 1 and expanded (its links
/// followed) while the budget is at least 2. `Unlimited` never runs out on
/// its own; only cross-host truncation, cancellation or the error budget end
/// an unlimited walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Unlimited,
    Limited(u32),
}

impl Depth {
    /// Budget given to links that leave the original host: fetch, never expand
    pub const CROSS_HOST: Depth = Depth::Limited(1);

    /// Builds a depth from the configuration/wire representation, where any
    /// negative number means unlimited
    pub fn from_signed(value: i64) -> Self {
        if value < 0 {
            Self::Unlimited
        } else {
            Self::Limited(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }

    /// True when nothing at this depth may be fetched
    pub fn is_exhausted(self) -> bool {
        matches!(self, Self::Limited(0))
    }

    /// True when a node at this depth is fetched but its links are not followed
    pub fn is_leaf(self) -> bool {
        matches!(self, Self::Limited(1))
    }

    /// Budget for the links found on a page at this depth
    pub fn decrement(self) -> Self {
        match self {
            Self::Unlimited => Self::Unlimited,
            Self::Limited(n) => Self::Limited(n.saturating_sub(1)),
        }
    }
}

impl From<i64> for Depth {
    fn from(value: i64) -> Self {
        Self::from_signed(value)
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => write!(f, "unlimited"),
            Self::Limited(n) => write!(f, "{}", n),
        }
    }
}
