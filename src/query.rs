//! Search query representation.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Default number of results requested when none is specified.
pub const DEFAULT_LIMIT: usize = 5;

/// A search query with its result limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The search terms.
    pub query: String,
    /// Maximum number of results to return (1-indexed page order).
    pub limit: usize,
}

impl SearchQuery {
    /// Creates a new search query with the default result limit.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: DEFAULT_LIMIT,
        }
    }

    /// Sets the result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Validates the query before any session work happens.
    ///
    /// Rejects empty or whitespace-only query text and a zero limit.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(SearchError::InvalidArgument(
                "query text is empty".to_string(),
            ));
        }
        if self.limit == 0 {
            return Err(SearchError::InvalidArgument(
                "result limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
