//! Error types for the search automation engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while driving a search session.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Query or limit failed validation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The browser or its proxy binding could not be started.
    #[error("Session launch failed: {0}")]
    SessionLaunch(String),

    /// Navigation did not settle within the configured bound.
    #[error("Navigation timed out: {0}")]
    NavigationTimeout(String),

    /// A challenge was presented and no solution token was obtained in time.
    #[error("Challenge unsolved: {0}")]
    ChallengeUnsolved(String),

    /// The results page structure was not recognized.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Another search is already in flight on this engine instance.
    #[error("Session busy: a search is already in flight")]
    SessionBusy,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}
