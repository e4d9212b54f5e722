//! Challenge state and the solve walk.
//!
//! When the destination serves an interstitial instead of results, the engine
//! walks it here: submit the challenge artifact to the solving service, poll
//! for a token within the configured budget, inject the token into the page,
//! and resubmit. Every wait is bounded; a query never hangs on a challenge.

use std::fmt;
use std::time::{Duration, Instant};

use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Result, SearchError};
use crate::retry::retry_with_backoff;
use crate::solver::ChallengeSolver;

/// Per-query challenge progress. Never persisted between queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeState {
    /// No challenge on the page.
    Absent,
    /// The destination served a challenge instead of results.
    Presented,
    /// Waiting on the solving service.
    Solving,
    /// A token was obtained and injected.
    Solved,
    /// No token within the budget, or injection failed. Terminal.
    Unsolved,
}

impl fmt::Display for ChallengeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChallengeState::Absent => "absent",
            ChallengeState::Presented => "presented",
            ChallengeState::Solving => "solving",
            ChallengeState::Solved => "solved",
            ChallengeState::Unsolved => "unsolved",
        };
        f.write_str(name)
    }
}

/// Everything a solving service needs about one presented challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeArtifact {
    /// Widget site key, when extractable from the page.
    pub site_key: Option<String>,
    /// URL of the page presenting the challenge.
    pub page_url: String,
    /// One-time payload some interstitials attach; must be forwarded.
    pub data_s: Option<String>,
    /// Enterprise widget variant.
    pub enterprise: bool,
}

/// Walks a presented challenge to completion on `page`.
///
/// Obtains a token within `config.challenge_wait`, injects it, and triggers
/// resubmission. The caller re-inspects the page afterwards; a page still
/// challenged then is `Unsolved`. All failure modes map to
/// [`SearchError::ChallengeUnsolved`].
pub async fn solve_challenge(
    page: &Page,
    artifact: &ChallengeArtifact,
    solver: &dyn ChallengeSolver,
    config: &EngineConfig,
) -> Result<()> {
    info!(
        state = %ChallengeState::Presented,
        site_key = artifact.site_key.as_deref().unwrap_or("<none>"),
        enterprise = artifact.enterprise,
        "challenge presented"
    );

    let token = await_token(solver, artifact, config).await?;
    apply_token(page, &token).await?;

    // A callback-style widget may verify in place without navigating, so a
    // quiet timeout here is not a failure
    let settled = tokio::time::timeout(config.navigation_timeout, page.wait_for_navigation()).await;
    match settled {
        Ok(Err(e)) => debug!("post-injection navigation wait failed: {e}"),
        Err(_) => debug!("page did not navigate after token injection"),
        Ok(Ok(_)) => {}
    }

    info!(state = %ChallengeState::Solved, "challenge token injected and resubmitted");
    Ok(())
}

/// Submits the artifact and polls until a token arrives or the budget runs
/// out. Transient solver errors are tolerated while time remains.
pub async fn await_token(
    solver: &dyn ChallengeSolver,
    artifact: &ChallengeArtifact,
    config: &EngineConfig,
) -> Result<String> {
    if artifact.site_key.is_none() {
        return Err(SearchError::ChallengeUnsolved(
            "challenge page has no extractable site key".to_string(),
        ));
    }

    let deadline = Instant::now() + config.challenge_wait;

    let task_id = retry_with_backoff(
        &config.retry,
        |e| matches!(e, SearchError::Http(_)),
        || solver.submit(artifact),
    )
    .await
    .map_err(|e| SearchError::ChallengeUnsolved(format!("solver submission failed: {e}")))?;

    info!(state = %ChallengeState::Solving, task_id = %task_id, "challenge submitted to solver");

    sleep_capped(config.solver_initial_wait, deadline).await;

    loop {
        if Instant::now() >= deadline {
            warn!(state = %ChallengeState::Unsolved, "challenge budget exhausted");
            return Err(SearchError::ChallengeUnsolved(format!(
                "no token within {:?}",
                config.challenge_wait
            )));
        }

        match solver.fetch_solution(&task_id).await {
            Ok(Some(token)) => {
                debug!(token_len = token.len(), "solver returned a token");
                return Ok(token);
            }
            Ok(None) => debug!("solution not ready yet"),
            // Bounded by the deadline, so a flaky poll is worth another try
            Err(e) => warn!("solver poll failed: {e}"),
        }

        sleep_capped(config.solver_poll_interval, deadline).await;
    }
}

/// Injects the solution token into the page and triggers resubmission.
pub async fn apply_token(page: &Page, token: &str) -> Result<()> {
    let script = injection_script(token);
    let eval = page
        .evaluate(script)
        .await
        .map_err(|e| SearchError::ChallengeUnsolved(format!("token injection failed: {e}")))?;
    if let Ok(outcome) = eval.into_value::<String>() {
        debug!(outcome = %outcome, "token injection script ran");
    }
    Ok(())
}

/// Builds the injection script. The token is embedded as a JSON string
/// literal so arbitrary token content cannot break out of the script.
fn injection_script(token: &str) -> String {
    let literal = serde_json::to_string(token).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(() => {{
    const token = {literal};
    const areas = document.querySelectorAll(
        'textarea[name="g-recaptcha-response"], textarea#g-recaptcha-response');
    for (const area of areas) {{ area.style.display = 'block'; area.value = token; }}
    const inputs = document.querySelectorAll('input[name="g-recaptcha-response"]');
    for (const input of inputs) {{ input.value = token; }}
    const holder = document.querySelector('[data-callback]');
    const callback = holder ? holder.getAttribute('data-callback') : null;
    if (callback && typeof window[callback] === 'function') {{
        window[callback](token);
        return 'callback';
    }}
    if (typeof window.submitCallback === 'function') {{
        window.submitCallback(token);
        return 'callback';
    }}
    const form = areas.length ? areas[0].closest('form') : document.querySelector('form');
    if (form) {{ form.submit(); return 'submitted'; }}
    return 'no-form';
}})()"#
    )
}

async fn sleep_capped(wanted: Duration, deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return;
    }
    sleep(wanted.min(remaining)).await;
}
