//! # serp-driver
//!
//! Automated web search over a real headless browser session.
//!
//! The crate drives Chrome through the DevTools protocol to run queries
//! against a search destination and hand back structured results, with
//! support for:
//!
//! - Lazy browser session launch and reuse across searches
//! - Anti-automation challenge detection and solving via an external service
//! - Upstream proxies, including authenticated ones
//! - Bounded timeouts, retries with backoff, and request pacing
//!
//! ## Example
//!
//! ```rust,no_run
//! use serp_driver::{EngineConfig, SearchEngine, SearchQuery, TwoCaptcha};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = SearchEngine::new(EngineConfig::default())
//!         .with_solver(TwoCaptcha::new("api-key"));
//!
//!     let results = engine
//!         .search(SearchQuery::new("rust async runtimes").with_limit(5))
//!         .await?;
//!     for result in &results {
//!         println!(
//!             "{}. {} {}",
//!             result.rank,
//!             result.title.as_deref().unwrap_or("(untitled)"),
//!             result.link.as_deref().unwrap_or("")
//!         );
//!     }
//!
//!     engine.close_browser().await;
//!     Ok(())
//! }
//! ```

mod challenge;
mod chrome;
mod config;
mod contract;
mod engine;
mod error;
mod proxy;
mod query;
mod result;
mod retry;
mod session;
mod solver;

pub use challenge::{ChallengeArtifact, ChallengeState};
pub use config::EngineConfig;
pub use contract::{GoogleSerp, PageContract};
pub use engine::SearchEngine;
pub use error::{Result, SearchError};
pub use proxy::{ProxyEndpoint, ProxyProtocol};
pub use query::{SearchQuery, DEFAULT_LIMIT};
pub use result::SearchResult;
pub use retry::RetryPolicy;
pub use solver::{ChallengeSolver, TwoCaptcha};
