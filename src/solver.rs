//! Challenge-solving service client.
//!
//! The engine talks to the solving service through [`ChallengeSolver`], so
//! tests can script one and alternative providers can slot in. [`TwoCaptcha`]
//! speaks the widely-cloned 2Captcha wire shape: a form POST that returns a
//! task id, then polling until the token is ready.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::challenge::ChallengeArtifact;
use crate::error::{Result, SearchError};

/// Default provider endpoint.
const DEFAULT_BASE_URL: &str = "https://2captcha.com";
/// Path receiving challenge submissions.
const SUBMIT_PATH: &str = "/in.php";
/// Path serving poll requests.
const POLL_PATH: &str = "/res.php";
/// Bound for any single HTTP call to the provider.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Provider's "keep polling" sentinel.
const NOT_READY: &str = "CAPCHA_NOT_READY";

/// External service that turns a challenge artifact into a solution token.
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    /// Submits the artifact; returns the provider's task id.
    async fn submit(&self, artifact: &ChallengeArtifact) -> Result<String>;

    /// Polls one task. `Ok(None)` while the solution is still pending.
    async fn fetch_solution(&self, task_id: &str) -> Result<Option<String>>;
}

/// Both provider endpoints answer in this JSON envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: u8,
    request: String,
}

/// 2Captcha-style HTTP client.
pub struct TwoCaptcha {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl TwoCaptcha {
    /// Creates a client for the hosted provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Points the client at a different provider speaking the same wire
    /// shape.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn submit_params(&self, artifact: &ChallengeArtifact, site_key: &str) -> Vec<(String, String)> {
        let mut params = vec![
            ("key".to_string(), self.api_key.clone()),
            ("method".to_string(), "userrecaptcha".to_string()),
            ("googlekey".to_string(), site_key.to_string()),
            ("pageurl".to_string(), artifact.page_url.clone()),
            ("json".to_string(), "1".to_string()),
        ];
        if let Some(ref data_s) = artifact.data_s {
            params.push(("data-s".to_string(), data_s.clone()));
        }
        if artifact.enterprise {
            params.push(("enterprise".to_string(), "1".to_string()));
        }
        params
    }

    fn poll_params(&self, task_id: &str) -> Vec<(String, String)> {
        vec![
            ("key".to_string(), self.api_key.clone()),
            ("action".to_string(), "get".to_string()),
            ("id".to_string(), task_id.to_string()),
            ("json".to_string(), "1".to_string()),
        ]
    }
}

fn parse_submit(response: ApiResponse) -> Result<String> {
    if response.status == 1 {
        Ok(response.request)
    } else {
        Err(SearchError::ChallengeUnsolved(format!(
            "solver rejected submission: {}",
            response.request
        )))
    }
}

fn parse_poll(response: ApiResponse) -> Result<Option<String>> {
    if response.status == 1 {
        return Ok(Some(response.request));
    }
    if response.request == NOT_READY {
        return Ok(None);
    }
    Err(SearchError::ChallengeUnsolved(format!(
        "solver error: {}",
        response.request
    )))
}

#[async_trait]
impl ChallengeSolver for TwoCaptcha {
    async fn submit(&self, artifact: &ChallengeArtifact) -> Result<String> {
        let site_key = artifact.site_key.as_deref().ok_or_else(|| {
            SearchError::ChallengeUnsolved("artifact has no site key".to_string())
        })?;

        let response: ApiResponse = self
            .client
            .post(format!("{}{}", self.base_url, SUBMIT_PATH))
            .timeout(HTTP_TIMEOUT)
            .form(&self.submit_params(artifact, site_key))
            .send()
            .await?
            .json()
            .await?;

        let task_id = parse_submit(response)?;
        debug!(task_id = %task_id, "challenge submitted");
        Ok(task_id)
    }

    async fn fetch_solution(&self, task_id: &str) -> Result<Option<String>> {
        let response: ApiResponse = self
            .client
            .get(format!("{}{}", self.base_url, POLL_PATH))
            .timeout(HTTP_TIMEOUT)
            .query(&self.poll_params(task_id))
            .send()
            .await?
            .json()
            .await?;

        parse_poll(response)
    }
}
