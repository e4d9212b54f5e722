//! Search orchestration.
//!
//! [`SearchEngine`] owns the browser session and runs one query end to end:
//! acquire or reuse the session, navigate, wait for the page to settle,
//! solve a challenge if one appears, extract, and pace the next request.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::Page;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::challenge::{solve_challenge, ChallengeArtifact};
use crate::config::EngineConfig;
use crate::contract::{GoogleSerp, PageContract};
use crate::error::{Result, SearchError};
use crate::query::SearchQuery;
use crate::result::SearchResult;
use crate::retry::{is_transient_message, retry_with_backoff};
use crate::session::SessionHandle;
use crate::solver::ChallengeSolver;

/// Interval between render checks while a page settles.
const RENDER_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// How many challenges a single query will attempt to solve before giving up.
const MAX_CHALLENGE_ROUNDS: u32 = 2;

/// What a settled page turned out to hold.
enum PageOutcome {
    /// Results rendered; carries the final HTML.
    Ready(String),
    /// An anti-automation challenge is blocking the page.
    Challenged(ChallengeArtifact),
    /// Neither results nor a challenge appeared within the wait budget.
    Quiet,
}

/// Automated search over a headless browser session.
///
/// The session is launched lazily on the first [`search`](Self::search) and
/// reused until it turns unhealthy or [`close_browser`](Self::close_browser)
/// is called. Configuration is fixed at construction.
pub struct SearchEngine {
    config: EngineConfig,
    contract: Arc<dyn PageContract>,
    solver: Option<Arc<dyn ChallengeSolver>>,
    session: Mutex<Option<SessionHandle>>,
}

impl SearchEngine {
    /// Creates an engine targeting the default destination, without a
    /// challenge solver.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            contract: Arc::new(GoogleSerp::new()),
            solver: None,
            session: Mutex::new(None),
        }
    }

    /// Swaps in a different destination contract.
    pub fn with_contract(mut self, contract: impl PageContract + 'static) -> Self {
        self.contract = Arc::new(contract);
        self
    }

    /// Attaches a challenge solver. Without one, a challenged search fails
    /// with [`SearchError::ChallengeUnsolved`] right away.
    pub fn with_solver(mut self, solver: impl ChallengeSolver + 'static) -> Self {
        self.solver = Some(Arc::new(solver));
        self
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one search and returns up to `query.limit` results in page order.
    ///
    /// The result list may hold fewer entries than the limit, including none;
    /// an empty page is a valid outcome, not an error. Searches are strictly
    /// serialized: while one is in flight, further calls fail fast with
    /// [`SearchError::SessionBusy`] instead of queueing.
    pub async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>> {
        query.validate()?;

        let mut slot = self
            .session
            .try_lock()
            .map_err(|_| SearchError::SessionBusy)?;

        let session = match slot.take() {
            Some(existing) => {
                if existing.is_healthy().await {
                    existing
                } else {
                    warn!("browser session is unresponsive, relaunching");
                    existing.shutdown().await;
                    SessionHandle::launch(&self.config).await?
                }
            }
            None => SessionHandle::launch(&self.config).await?,
        };

        let outcome = self.run_query(&session, &query).await;

        // Session-level failures tear the browser down so the next call
        // starts clean; query-level failures keep the session for reuse,
        // unless the browser itself stopped answering.
        match &outcome {
            Ok(_) => *slot = Some(session),
            Err(e) if is_session_fatal(e) => {
                warn!(error = %e, "session failure, shutting the browser down");
                session.shutdown().await;
            }
            Err(_) => {
                if session.is_healthy().await {
                    *slot = Some(session);
                } else {
                    warn!("browser session unhealthy after failed query, shutting it down");
                    session.shutdown().await;
                }
            }
        }

        outcome
    }

    /// Shuts the browser session down and releases every associated resource.
    ///
    /// Idempotent and infallible: calling with no live session does nothing,
    /// and repeated calls are safe. Waits for an in-flight search to finish
    /// first. Dropping the engine without calling this aborts the CDP event
    /// loop but skips the orderly browser shutdown.
    pub async fn close_browser(&self) {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.take() {
            info!("closing browser session");
            session.shutdown().await;
        }
    }

    /// Whether a live browser session exists. A search in flight counts as
    /// active.
    pub async fn is_session_active(&self) -> bool {
        match self.session.try_lock() {
            Ok(slot) => slot.is_some(),
            Err(_) => true,
        }
    }

    /// One query against an acquired session: open a tab, drive it, close
    /// it, then pace the next request.
    async fn run_query(
        &self,
        session: &SessionHandle,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>> {
        info!(
            destination = self.contract.name(),
            query = %query.query,
            limit = query.limit,
            "search started"
        );

        let page = session.open_page().await?;
        let outcome = self.drive_page(&page, query).await;
        session.close_page(page).await;

        // The destination saw a request whether or not it answered well, so
        // the pacing delay applies on every outcome past this point.
        if !self.config.request_delay.is_zero() {
            debug!(
                delay_ms = self.config.request_delay.as_millis() as u64,
                "inter-request pause"
            );
            sleep(self.config.request_delay).await;
        }

        outcome
    }

    async fn drive_page(&self, page: &Page, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let url = self.contract.search_url(query);
        self.navigate(page, &url).await?;

        let mut challenge_rounds = 0;
        loop {
            match self.settle(page).await? {
                PageOutcome::Ready(html) => {
                    let mut results = self.contract.extract(&html)?;
                    results.truncate(query.limit);
                    info!(count = results.len(), "search finished");
                    return Ok(results);
                }
                PageOutcome::Challenged(artifact) => {
                    challenge_rounds += 1;
                    if challenge_rounds > MAX_CHALLENGE_ROUNDS {
                        return Err(SearchError::ChallengeUnsolved(
                            "challenge persisted after solving".to_string(),
                        ));
                    }
                    let solver = self.solver.as_deref().ok_or_else(|| {
                        SearchError::ChallengeUnsolved(
                            "challenge presented but no solver is configured".to_string(),
                        )
                    })?;
                    solve_challenge(page, &artifact, solver, &self.config).await?;
                    // Loop around and wait for the post-challenge page.
                }
                PageOutcome::Quiet => {
                    warn!(
                        wait_secs = self.config.results_wait.as_secs(),
                        "results never rendered, treating the page as empty"
                    );
                    return Ok(Vec::new());
                }
            }
        }
    }

    /// Navigates with bounded retries on transient network failures. Every
    /// attempt is capped by the configured navigation timeout.
    async fn navigate(&self, page: &Page, url: &str) -> Result<()> {
        retry_with_backoff(
            &self.config.retry,
            |err| matches!(err, SearchError::NavigationTimeout(m) if is_transient_message(m)),
            || async {
                match timeout(self.config.navigation_timeout, page.goto(url)).await {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(e)) => Err(SearchError::NavigationTimeout(format!(
                        "navigation to {url} failed: {e}"
                    ))),
                    Err(_) => Err(SearchError::NavigationTimeout(format!(
                        "navigation to {url} timed out after {:?}",
                        self.config.navigation_timeout
                    ))),
                }
            },
        )
        .await
    }

    /// Polls until the page shows results or a challenge, or the wait budget
    /// runs out.
    async fn settle(&self, page: &Page) -> Result<PageOutcome> {
        let deadline = Instant::now() + self.config.results_wait;
        loop {
            if page
                .find_element(self.contract.results_selector())
                .await
                .is_ok()
            {
                let html = page_html(page).await?;
                return Ok(PageOutcome::Ready(html));
            }

            let html = page_html(page).await?;
            let url = current_url(page).await;
            if let Some(artifact) = self.contract.detect_challenge(&url, &html) {
                return Ok(PageOutcome::Challenged(artifact));
            }

            if Instant::now() >= deadline {
                return Ok(PageOutcome::Quiet);
            }
            sleep(RENDER_POLL_INTERVAL).await;
        }
    }
}

/// Errors that invalidate the browser session itself rather than the query.
fn is_session_fatal(error: &SearchError) -> bool {
    matches!(error, SearchError::SessionLaunch(_))
}

async fn page_html(page: &Page) -> Result<String> {
    page.content()
        .await
        .map_err(|e| SearchError::Extraction(format!("could not read page content: {e}")))
}

async fn current_url(page: &Page) -> String {
    match page.url().await {
        Ok(Some(url)) => url,
        _ => String::new(),
    }
}
