//! Search result types.

use serde::{Deserialize, Serialize};

/// A single extracted search result.
///
/// Every field the page may or may not render is optional; a result missing
/// its snippet is still useful, while one with neither title nor link carries
/// no information and is dropped during extraction (see
/// [`SearchResult::is_substantive`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// 1-based rank in page order.
    #[serde(default)]
    pub rank: usize,
    /// Result title.
    pub title: Option<String>,
    /// Absolute destination URL.
    pub link: Option<String>,
    /// Result description/snippet, never truncated by the engine.
    pub snippet: Option<String>,
}

impl SearchResult {
    /// Creates an empty result at the given page rank.
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            title: None,
            link: None,
            snippet: None,
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the destination link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Sets the snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// True when the result carries at least a title or a link.
    pub fn is_substantive(&self) -> bool {
        self.title.is_some() || self.link.is_some()
    }
}
