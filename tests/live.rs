//! Live tests driving a real headless Chrome against the live destination.
//!
//! These tests are marked with `#[ignore]` by default because they require a
//! Chrome binary and network access, and back-to-back runs can trip the
//! destination's rate limiting.
//!
//! Run with: `cargo test --test live -- --ignored --test-threads=1`

use std::time::Duration;

use serp_driver::{EngineConfig, SearchEngine, SearchQuery, SearchResult};

/// Helper that runs one query and prints what came back.
async fn run_search(engine: &SearchEngine, query: &str, limit: usize) -> Vec<SearchResult> {
    match engine
        .search(SearchQuery::new(query).with_limit(limit))
        .await
    {
        Ok(results) => {
            println!("'{query}' returned {} results", results.len());
            for result in &results {
                println!(
                    "  {}. {} - {}",
                    result.rank,
                    result.title.as_deref().unwrap_or("(untitled)"),
                    result.link.as_deref().unwrap_or("(no link)")
                );
            }
            results
        }
        Err(e) => {
            println!("'{query}' failed: {e}");
            Vec::new()
        }
    }
}

/// Engine logs are handy when a live run misbehaves; enable with e.g.
/// `RUST_LOG=serp_driver=debug`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn quick_config() -> EngineConfig {
    init_tracing();
    EngineConfig::new()
        .with_request_delay(Duration::from_millis(500))
        .with_hosted(std::env::var_os("CI").is_some())
}

mod search_tests {
    use super::*;

    #[tokio::test]
    #[ignore]
    async fn test_search_returns_ranked_results() {
        let engine = SearchEngine::new(quick_config());

        let results = run_search(&engine, "Defano Holwijn", 5).await;
        assert!(results.len() <= 5);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.rank, i + 1);
            assert!(
                result.title.is_some() || result.link.is_some(),
                "result {} carries neither title nor link",
                i + 1
            );
        }

        engine.close_browser().await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_search_respects_limit() {
        let engine = SearchEngine::new(quick_config());

        let results = run_search(&engine, "rust programming language", 2).await;
        assert!(results.len() <= 2);

        engine.close_browser().await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_no_match_query_is_empty_not_error() {
        let engine = SearchEngine::new(quick_config());

        let outcome = engine
            .search(SearchQuery::new("jxqzv wvvqp zzkxy plomtr").with_limit(5))
            .await;
        assert!(outcome.is_ok(), "a matchless query must not be an error");
        println!("matchless query returned {} results", outcome.unwrap().len());

        engine.close_browser().await;
    }
}

mod session_tests {
    use super::*;
    use std::sync::Arc;

    use serp_driver::SearchError;

    #[tokio::test]
    #[ignore]
    async fn test_session_is_reused_across_searches() {
        let engine = SearchEngine::new(quick_config());
        assert!(!engine.is_session_active().await);

        run_search(&engine, "rust programming language", 3).await;
        assert!(engine.is_session_active().await);

        run_search(&engine, "tokio async runtime", 3).await;
        assert!(engine.is_session_active().await);

        engine.close_browser().await;
        assert!(!engine.is_session_active().await);
    }

    #[tokio::test]
    #[ignore]
    async fn test_search_after_close_relaunches() {
        let engine = SearchEngine::new(quick_config());

        run_search(&engine, "rust language", 2).await;
        engine.close_browser().await;
        assert!(!engine.is_session_active().await);

        let results = run_search(&engine, "cargo workspaces", 2).await;
        println!("relaunched session returned {} results", results.len());
        assert!(engine.is_session_active().await);

        engine.close_browser().await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_concurrent_search_is_rejected() {
        let engine = Arc::new(SearchEngine::new(quick_config()));

        let background = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .search(SearchQuery::new("rust language").with_limit(2))
                    .await
            })
        };

        // Give the first search a head start so it holds the slot.
        tokio::time::sleep(Duration::from_millis(250)).await;

        let second = engine
            .search(SearchQuery::new("go language").with_limit(2))
            .await;
        assert!(matches!(second, Err(SearchError::SessionBusy)));

        let first = background.await.unwrap();
        println!("first search finished with: {:?}", first.map(|r| r.len()));

        engine.close_browser().await;
    }
}

mod recovery_tests {
    use super::*;

    use serp_driver::{ChallengeArtifact, PageContract, Result};

    /// Contract pointing at a port nothing listens on.
    struct DeadEnd;

    impl PageContract for DeadEnd {
        fn name(&self) -> &str {
            "dead-end"
        }

        fn search_url(&self, _query: &SearchQuery) -> String {
            "http://127.0.0.1:9/".to_string()
        }

        fn results_selector(&self) -> &str {
            "div.g"
        }

        fn extract(&self, _html: &str) -> Result<Vec<SearchResult>> {
            Ok(Vec::new())
        }

        fn detect_challenge(&self, _page_url: &str, _html: &str) -> Option<ChallengeArtifact> {
            None
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_failed_search_still_closes_cleanly() {
        let engine = SearchEngine::new(quick_config()).with_contract(DeadEnd);

        let outcome = engine.search(SearchQuery::new("anything").with_limit(3)).await;
        println!(
            "dead-end navigation came back as: {:?}",
            outcome.map(|r| r.len())
        );

        engine.close_browser().await;
        engine.close_browser().await;
        assert!(!engine.is_session_active().await);
    }
}

mod challenge_tests {
    use super::*;

    use serp_driver::TwoCaptcha;

    #[tokio::test]
    #[ignore]
    async fn test_search_with_solver_configured() {
        let api_key = match std::env::var("TWOCAPTCHA_API_KEY") {
            Ok(key) => key,
            Err(_) => {
                println!("TWOCAPTCHA_API_KEY not set, skipping");
                return;
            }
        };

        let engine = SearchEngine::new(quick_config()).with_solver(TwoCaptcha::new(api_key));
        let results = run_search(&engine, "weather amsterdam", 3).await;
        println!("solver-backed search returned {} results", results.len());

        engine.close_browser().await;
    }
}
