// Fetch backend registry and weighted selection.
//
// Backends are registered once at startup with declared capabilities and
// matching criteria, then the registry is read-only: `select` takes `&self`
// and is safe for concurrent callers without extra locking.

use crate::url::UrlDescriptor;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Failure from a fetch backend. Only `Transient` failures are retried.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Expected to possibly succeed on retry: timeouts, connection resets,
    /// origin rate limiting.
    #[error("transient fetch failure: {0}")]
    Transient(String),
    /// Retrying will not help: client errors, unsupported content,
    /// explicit rejection.
    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Per-request options handed to a backend.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: format!("docfetch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Raw fetch outcome a backend returns; the engine passes the body through
/// to the content-extraction collaborator unmodified.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub elapsed: Duration,
}

/// A pluggable fetch implementation. Implementations must distinguish
/// transient from permanent failure via the `FetchError` variants.
#[async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchResponse, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct BackendCapabilities {
    pub renders_js: bool,
    pub streaming: bool,
    pub concurrency_hint: Option<usize>,
}

/// Declared identity, capabilities and matching criteria for a registered
/// backend.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    pub name: String,
    pub capabilities: BackendCapabilities,
    /// Content-type substrings this backend prefers, e.g. "text/html".
    pub content_types: Vec<String>,
    /// Domain patterns this backend prefers: exact host, registrable domain,
    /// or "*.example.com".
    pub domain_patterns: Vec<String>,
    /// Base priority weight added to every score.
    pub weight: u32,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: BackendCapabilities::default(),
            content_types: Vec::new(),
            domain_patterns: Vec::new(),
            weight: 0,
        }
    }

    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_content_types(mut self, content_types: Vec<String>) -> Self {
        self.content_types = content_types;
        self
    }

    pub fn with_domain_patterns(mut self, domain_patterns: Vec<String>) -> Self {
        self.domain_patterns = domain_patterns;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }
}

/// A backend bound to its descriptor inside the registry.
pub struct RegisteredBackend {
    pub descriptor: BackendDescriptor,
    pub backend: Arc<dyn FetchBackend>,
}

// Score components. The override is dominant by construction; criteria
// matches dwarf bare weights so a weight alone cannot clear the threshold.
const OVERRIDE_SCORE: u32 = 1_000;
const CONTENT_TYPE_SCORE: u32 = 100;
const DOMAIN_SCORE: u32 = 50;
const MIN_SELECT_SCORE: u32 = 50;

/// Registry of fetch backends. A default backend is mandatory at
/// construction, so an empty registry is unrepresentable and a missing
/// default surfaces at startup rather than mid-crawl.
pub struct BackendRegistry {
    entries: Vec<RegisteredBackend>,
    default_index: usize,
    min_score: u32,
}

impl BackendRegistry {
    /// Creates a registry whose first entry is the mandatory default backend.
    pub fn new(descriptor: BackendDescriptor, backend: Arc<dyn FetchBackend>) -> Self {
        Self {
            entries: vec![RegisteredBackend {
                descriptor,
                backend,
            }],
            default_index: 0,
            min_score: MIN_SELECT_SCORE,
        }
    }

    /// Registers an additional backend. Registration order is significant:
    /// score ties break toward the earlier registration.
    pub fn register(&mut self, descriptor: BackendDescriptor, backend: Arc<dyn FetchBackend>) {
        debug!(backend = %descriptor.name, "registering fetch backend");
        self.entries.push(RegisteredBackend {
            descriptor,
            backend,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn default_backend(&self) -> &RegisteredBackend {
        &self.entries[self.default_index]
    }

    /// Picks the highest-scoring backend for a validated descriptor, falling
    /// back to the default below the minimum score. Deterministic: identical
    /// registry and inputs always return the same backend.
    pub fn select(
        &self,
        url: &UrlDescriptor,
        content_hint: Option<&str>,
        override_name: Option<&str>,
    ) -> &RegisteredBackend {
        let mut best: Option<(&RegisteredBackend, u32)> = None;
        for entry in &self.entries {
            let score = score_backend(&entry.descriptor, url, content_hint, override_name);
            // Strict comparison keeps the earliest registration on ties.
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((entry, score)),
            }
        }
        match best {
            Some((entry, score)) if score >= self.min_score => entry,
            _ => self.default_backend(),
        }
    }
}

fn score_backend(
    descriptor: &BackendDescriptor,
    url: &UrlDescriptor,
    content_hint: Option<&str>,
    override_name: Option<&str>,
) -> u32 {
    let mut score = descriptor.weight;
    if let Some(name) = override_name
        && name == descriptor.name
    {
        score += OVERRIDE_SCORE;
    }
    if let Some(hint) = content_hint
        && descriptor.content_types.iter().any(|ct| hint.contains(ct.as_str()))
    {
        score += CONTENT_TYPE_SCORE;
    }
    if descriptor
        .domain_patterns
        .iter()
        .any(|pattern| domain_matches(&url.host, pattern))
    {
        score += DOMAIN_SCORE;
    }
    score
}

fn domain_matches(host: &str, pattern: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix("*.") {
        return host.ends_with(&format!(".{suffix}"));
    }
    host == pattern || host.ends_with(&format!(".{pattern}"))
}
