//! Engine configuration.
//!
//! Every knob is fixed when the engine is constructed; nothing here mutates
//! afterwards. Defaults mirror a production deployment: a 2.5 second pause
//! between queries and bounded waits at every suspension point.

use std::path::PathBuf;
use std::time::Duration;

use crate::proxy::ProxyEndpoint;
use crate::retry::RetryPolicy;

/// Default pause between queries, in milliseconds.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 2500;

/// Default bound for a single navigation.
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;

/// Default wait for the results page to render after navigation settles.
pub const DEFAULT_RESULTS_WAIT_SECS: u64 = 10;

/// Default overall budget for one challenge walk (submit, poll, inject).
pub const DEFAULT_CHALLENGE_WAIT_SECS: u64 = 60;

/// Default pause before the first solver poll; solving takes a while and
/// polling earlier just burns requests.
pub const DEFAULT_SOLVER_INITIAL_WAIT_SECS: u64 = 10;

/// Default interval between solver polls.
pub const DEFAULT_SOLVER_POLL_INTERVAL_SECS: u64 = 5;

/// Default desktop user agent. The stock headless UA advertises automation
/// and gets challenged far more often.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Construction-time configuration for a [`crate::SearchEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Outbound proxy for all browser traffic, if any.
    pub proxy: Option<ProxyEndpoint>,
    /// User agent applied to every page.
    pub user_agent: String,
    /// Explicit Chrome/Chromium binary; auto-detected when unset.
    pub chrome_path: Option<PathBuf>,
    /// Hosted (containerized) execution: relaxes the browser sandbox, which
    /// most container hosts require. Local runs keep the sandbox on.
    pub hosted: bool,
    /// Additional Chrome launch arguments appended after the built-in set.
    pub extra_args: Vec<String>,
    /// Pause applied after any query that reached the destination page.
    pub request_delay: Duration,
    /// Bound for a single navigation attempt.
    pub navigation_timeout: Duration,
    /// How long to wait for results (or a challenge) to render.
    pub results_wait: Duration,
    /// Overall budget for solving one challenge.
    pub challenge_wait: Duration,
    /// Pause before the first solver poll.
    pub solver_initial_wait: Duration,
    /// Interval between solver polls.
    pub solver_poll_interval: Duration,
    /// Retry policy for transient navigation failures.
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chrome_path: None,
            hosted: false,
            extra_args: Vec::new(),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            navigation_timeout: Duration::from_secs(DEFAULT_NAVIGATION_TIMEOUT_SECS),
            results_wait: Duration::from_secs(DEFAULT_RESULTS_WAIT_SECS),
            challenge_wait: Duration::from_secs(DEFAULT_CHALLENGE_WAIT_SECS),
            solver_initial_wait: Duration::from_secs(DEFAULT_SOLVER_INITIAL_WAIT_SECS),
            solver_poll_interval: Duration::from_secs(DEFAULT_SOLVER_POLL_INTERVAL_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the outbound proxy.
    pub fn with_proxy(mut self, proxy: ProxyEndpoint) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets an explicit browser binary path.
    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Marks the engine as running on a hosted/containerized platform.
    pub fn with_hosted(mut self, hosted: bool) -> Self {
        self.hosted = hosted;
        self
    }

    /// Appends an extra Chrome launch argument.
    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Sets the inter-request delay.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Sets the navigation timeout.
    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Sets the results-render wait.
    pub fn with_results_wait(mut self, wait: Duration) -> Self {
        self.results_wait = wait;
        self
    }

    /// Sets the overall challenge budget.
    pub fn with_challenge_wait(mut self, wait: Duration) -> Self {
        self.challenge_wait = wait;
        self
    }

    /// Sets the pause before the first solver poll.
    pub fn with_solver_initial_wait(mut self, wait: Duration) -> Self {
        self.solver_initial_wait = wait;
        self
    }

    /// Sets the interval between solver polls.
    pub fn with_solver_poll_interval(mut self, interval: Duration) -> Self {
        self.solver_poll_interval = interval;
        self
    }

    /// Sets the retry policy for transient navigation failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.proxy.is_none());
        assert!(config.chrome_path.is_none());
        assert!(!config.hosted);
        assert!(config.extra_args.is_empty());
        assert_eq!(config.request_delay, Duration::from_millis(2500));
        assert_eq!(config.navigation_timeout, Duration::from_secs(30));
        assert_eq!(config.results_wait, Duration::from_secs(10));
        assert_eq!(config.challenge_wait, Duration::from_secs(60));
        assert_eq!(config.solver_initial_wait, Duration::from_secs(10));
        assert_eq!(config.solver_poll_interval, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_default_user_agent_is_not_headless() {
        assert!(!DEFAULT_USER_AGENT.contains("Headless"));
        assert!(DEFAULT_USER_AGENT.contains("Chrome/"));
    }

    #[test]
    fn test_builder_chain() {
        let config = EngineConfig::new()
            .with_proxy(ProxyEndpoint::new("127.0.0.1", 3128))
            .with_user_agent("custom-agent")
            .with_chrome_path("/usr/bin/chromium")
            .with_hosted(true)
            .with_extra_arg("--lang=en-US")
            .with_request_delay(Duration::from_millis(100))
            .with_navigation_timeout(Duration::from_secs(5))
            .with_results_wait(Duration::from_secs(2))
            .with_challenge_wait(Duration::from_secs(20))
            .with_solver_initial_wait(Duration::from_secs(1))
            .with_solver_poll_interval(Duration::from_secs(1))
            .with_retry(RetryPolicy::none());

        assert_eq!(config.proxy.as_ref().unwrap().port, 3128);
        assert_eq!(config.user_agent, "custom-agent");
        assert_eq!(
            config.chrome_path.as_deref(),
            Some(std::path::Path::new("/usr/bin/chromium"))
        );
        assert!(config.hosted);
        assert_eq!(config.extra_args, vec!["--lang=en-US"]);
        assert_eq!(config.request_delay, Duration::from_millis(100));
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn test_extra_args_accumulate() {
        let config = EngineConfig::new()
            .with_extra_arg("--lang=en-US")
            .with_extra_arg("--disable-extensions");
        assert_eq!(config.extra_args.len(), 2);
    }

    #[test]
    fn test_config_clone() {
        let config = EngineConfig::new().with_hosted(true);
        let cloned = config.clone();
        assert!(cloned.hosted);
        assert_eq!(cloned.user_agent, config.user_agent);
    }
}
