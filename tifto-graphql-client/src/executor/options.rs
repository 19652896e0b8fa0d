//! Options for a single query handle.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::{FetchPolicy, SharedError};

/// How GraphQL errors in a response are surfaced on a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Errors set `error`; any partial data is discarded.
    #[default]
    None,
    /// Errors are dropped; data is kept.
    Ignore,
    /// Data and errors are both kept.
    All,
}

/// Called with the data of every applied successful execution.
pub type CompletedCallback = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

/// Called with the error of every applied failed execution.
pub type ErrorCallback = Arc<dyn Fn(&SharedError) + Send + Sync>;

/// Query handle options.
#[derive(Clone)]
pub struct QueryOptions {
    /// When false nothing is sent until enabled.
    pub enabled: bool,
    /// Quiet period coalescing `refetch` calls.
    pub debounce: Duration,
    /// Re-execute on this cadence while the handle lives.
    pub poll_interval: Option<Duration>,
    /// Policy of the initial execution. Refetches and poll ticks use
    /// [`FetchPolicy::refetch_policy`] so they always reach the network.
    pub fetch_policy: FetchPolicy,
    pub error_policy: ErrorPolicy,
    /// Extra attempts for a failed `refetch`.
    pub retry: u32,
    /// Flat delay between refetch attempts.
    pub retry_delay: Duration,
    pub on_completed: Option<CompletedCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: Duration::from_millis(500),
            poll_interval: None,
            fetch_policy: FetchPolicy::default(),
            error_policy: ErrorPolicy::default(),
            retry: 3,
            retry_delay: Duration::from_secs(1),
            on_completed: None,
            on_error: None,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn on_completed(mut self, callback: impl Fn(Option<&Value>) + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&SharedError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("enabled", &self.enabled)
            .field("debounce", &self.debounce)
            .field("poll_interval", &self.poll_interval)
            .field("fetch_policy", &self.fetch_policy)
            .field("error_policy", &self.error_policy)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .field("on_completed", &self.on_completed.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
