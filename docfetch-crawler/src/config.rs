// Crawl run configuration. Immutable once a run starts.

use crate::error::{CrawlError, Result};
use docfetch_core::url::UrlPolicy;
use regex::Regex;
use std::time::Duration;

/// Configuration for one crawl run: concurrency and rate budgets, depth and
/// page limits, retry policy, path filters and the URL policy.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Size of the worker pool.
    pub concurrency: usize,
    /// Token-bucket refill rate shared by all workers.
    pub requests_per_second: u32,
    /// Token-bucket burst capacity.
    pub burst: u32,
    /// Transient failures re-enqueue up to this many times.
    pub max_retries: u32,
    /// Hard per-request timeout; an elapsed timeout counts as transient.
    pub request_timeout: Duration,
    /// Jobs admitted to the frontier are capped at this count.
    pub max_pages: usize,
    /// Links deeper than this never enter the frontier.
    pub max_depth: u32,
    /// Admit links whose registrable domain differs from the crawl scope.
    pub follow_external: bool,
    /// When non-empty, a path must match at least one include pattern.
    pub include_patterns: Vec<Regex>,
    /// A path matching any exclude pattern is rejected.
    pub exclude_patterns: Vec<Regex>,
    /// Force backend selection toward this registered backend name.
    pub backend_override: Option<String>,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub user_agent: String,
    pub url_policy: UrlPolicy,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            requests_per_second: 4,
            burst: 4,
            max_retries: 2,
            request_timeout: Duration::from_secs(10),
            max_pages: 100,
            max_depth: 3,
            follow_external: false,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            backend_override: None,
            backoff_base: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(10),
            user_agent: format!(
                "docfetch/{} (https://github.com/trapdoorsec/docfetch)",
                env!("CARGO_PKG_VERSION")
            ),
            url_policy: UrlPolicy::default(),
        }
    }
}

impl CrawlConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_requests_per_second(mut self, rate: u32) -> Self {
        self.requests_per_second = rate;
        self
    }

    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_follow_external(mut self, follow: bool) -> Self {
        self.follow_external = follow;
        self
    }

    pub fn with_include_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.include_patterns = patterns;
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn with_backend_override(mut self, name: impl Into<String>) -> Self {
        self.backend_override = Some(name.into());
        self
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_url_policy(mut self, policy: UrlPolicy) -> Self {
        self.url_policy = policy;
        self
    }

    /// Fatal-at-start validation: a run never begins with a zero budget.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(CrawlError::Config("concurrency must be at least 1".into()));
        }
        if self.requests_per_second == 0 {
            return Err(CrawlError::Config(
                "requests_per_second must be at least 1".into(),
            ));
        }
        if self.burst == 0 {
            return Err(CrawlError::Config("burst must be at least 1".into()));
        }
        if self.max_pages == 0 {
            return Err(CrawlError::Config("max_pages must be at least 1".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(CrawlError::Config("request_timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Applies include/exclude patterns to a URL path.
    pub fn path_admitted(&self, path: &str) -> bool {
        if !self.include_patterns.is_empty()
            && !self.include_patterns.iter().any(|p| p.is_match(path))
        {
            return false;
        }
        !self.exclude_patterns.iter().any(|p| p.is_match(path))
    }
}
