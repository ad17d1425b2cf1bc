// The crawl engine: a bounded worker pool over a shared frontier, with
// token-bucket rate limiting, retry with jittered backoff and the
// link-discovery feedback loop through the URL model.
//
// Job lifecycle: Pending (in frontier) -> Dispatched (worker holds it) ->
// Succeeded | Failed | Skipped. A transient failure goes back to Pending with
// a backoff gate until the retry budget runs out.

use crate::backoff::backoff_delay;
use crate::config::CrawlConfig;
use crate::error::Result;
use crate::error::CrawlError;
use crate::fetch::{HrefExtractor, HttpBackend, LinkExtractor};
use crate::frontier::{Admission, Frontier};
use crate::result::{CrawlSummary, PageResult, PageStatus};
use docfetch_core::backend::{BackendDescriptor, BackendRegistry, FetchError, FetchOptions};
use docfetch_core::url::UrlResolver;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One crawl engine instance. All mutable crawl state (frontier, visited set,
/// rate bucket) is owned here and injected into workers, so independent
/// crawls can run side by side in one process.
pub struct Crawler {
    config: Arc<CrawlConfig>,
    registry: Arc<BackendRegistry>,
    extractor: Arc<dyn LinkExtractor>,
    cancel: Arc<AtomicBool>,
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler").finish_non_exhaustive()
    }
}

impl Crawler {
    /// Engine with the default HTTP backend as the registry's mandatory
    /// default.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let backend = HttpBackend::new(&config.user_agent, config.request_timeout);
        let registry = BackendRegistry::new(BackendDescriptor::new("http"), Arc::new(backend));
        Self::with_registry(config, registry)
    }

    /// Engine over a caller-built registry (extra backends, custom default).
    pub fn with_registry(config: CrawlConfig, registry: BackendRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            extractor: Arc::new(HrefExtractor),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replaces the default href extractor with the content-extraction
    /// collaborator's implementation.
    pub fn with_extractor(mut self, extractor: Arc<dyn LinkExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Requests cooperative cancellation: no further dispatches, in-flight
    /// fetches finish, the remaining frontier drains as skipped. The flag
    /// clears when the run completes, so the engine stays usable for
    /// subsequent crawls.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Shareable handle for cancelling from another task.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Runs a crawl from the given seeds until the frontier settles, the page
    /// budget is spent, or cancellation. Only configuration and seed errors
    /// fail the call; per-page failures land in the summary.
    pub async fn crawl(&self, seeds: &[&str]) -> Result<CrawlSummary> {
        let started = Instant::now();
        info!(
            "Starting crawl of {:?} with {} workers",
            seeds, self.config.concurrency
        );

        let mut resolver = UrlResolver::new(self.config.url_policy.clone());
        let mut frontier = Frontier::new();
        for seed in seeds {
            let descriptor = resolver.resolve(seed, None)?;
            if resolver.scope().is_none() {
                // The first seed's registrable domain is the crawl scope.
                resolver.set_scope(descriptor.domain.registrable.clone());
            }
            frontier.admit(&self.config, descriptor, 0, None);
        }
        if frontier.is_empty() {
            return Err(CrawlError::Config("no seed URLs were admitted".into()));
        }

        let rate = NonZeroU32::new(self.config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.config.burst).unwrap_or(NonZeroU32::MIN);
        let limiter: Arc<DefaultDirectRateLimiter> =
            Arc::new(RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)));

        let resolver = Arc::new(resolver);
        let frontier = Arc::new(Mutex::new(frontier));
        let results = Arc::new(Mutex::new(Vec::<PageResult>::new()));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for worker_id in 0..self.config.concurrency {
            let config = self.config.clone();
            let registry = self.registry.clone();
            let extractor = self.extractor.clone();
            let cancel = self.cancel.clone();
            let limiter = limiter.clone();
            let resolver = resolver.clone();
            let frontier = frontier.clone();
            let results = results.clone();
            let in_flight = in_flight.clone();

            handles.push(tokio::spawn(async move {
                debug!("Worker {} started", worker_id);

                loop {
                    if cancel.load(Ordering::SeqCst) {
                        debug!("Worker {} observed cancellation", worker_id);
                        break;
                    }

                    // Dispatch boundary: pop under the frontier lock and mark
                    // the job in flight before releasing it, so idle workers
                    // never observe "empty and settled" while work remains.
                    let entry = {
                        let mut frontier = frontier.lock().await;
                        match frontier.pop_ready(Instant::now()) {
                            Some(entry) => {
                                in_flight.fetch_add(1, Ordering::SeqCst);
                                Some(entry)
                            }
                            None => {
                                if frontier.is_empty() && in_flight.load(Ordering::SeqCst) == 0 {
                                    break;
                                }
                                None
                            }
                        }
                    };
                    let Some(entry) = entry else {
                        // Work is in flight or gated on backoff; poll again.
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        continue;
                    };

                    // Issue rate is decoupled from in-flight concurrency:
                    // every dispatch spends one token.
                    limiter.until_ready().await;

                    let chosen = registry.select(&entry.url, None, config.backend_override.as_deref());
                    let backend_name = chosen.descriptor.name.clone();
                    debug!(
                        "Worker {} fetching {} via {} (depth {}, attempt {})",
                        worker_id,
                        entry.url.normalized,
                        backend_name,
                        entry.depth,
                        entry.retries + 1
                    );

                    let options = FetchOptions {
                        timeout: config.request_timeout,
                        user_agent: config.user_agent.clone(),
                    };
                    let outcome = match tokio::time::timeout(
                        config.request_timeout,
                        chosen.backend.fetch(entry.url.url(), &options),
                    )
                    .await
                    {
                        Ok(result) => result,
                        // The fetch is abandoned; deadline overruns retry.
                        Err(_) => Err(FetchError::Transient("request deadline elapsed".into())),
                    };

                    match outcome {
                        Ok(response) => {
                            let raw_links =
                                extractor.extract(&response.body, response.content_type.as_deref());

                            let mut admitted = Vec::new();
                            {
                                let mut frontier = frontier.lock().await;
                                for href in &raw_links {
                                    match resolver.resolve(href, Some(entry.url.url())) {
                                        Ok(descriptor) => {
                                            let normalized = descriptor.normalized.clone();
                                            let admission = frontier.admit(
                                                &config,
                                                descriptor,
                                                entry.depth + 1,
                                                Some(entry.url.normalized.clone()),
                                            );
                                            if admission == Admission::Accepted {
                                                admitted.push(normalized);
                                            }
                                        }
                                        Err(rejection) => {
                                            debug!(
                                                "Dropping link {:?}: {}",
                                                rejection.raw, rejection.reason
                                            );
                                            frontier.count_invalid();
                                        }
                                    }
                                }
                            }

                            results.lock().await.push(PageResult {
                                url: entry.url.normalized.clone(),
                                status: PageStatus::Success,
                                http_status: Some(response.status),
                                content_type: response.content_type.clone(),
                                content: Some(response.body),
                                links: admitted,
                                error: None,
                                elapsed: response.elapsed,
                                backend: backend_name,
                                depth: entry.depth,
                                retries: entry.retries,
                            });
                        }
                        Err(err) if err.is_transient() && entry.retries < config.max_retries => {
                            let delay =
                                backoff_delay(config.backoff_base, config.backoff_cap, entry.retries);
                            warn!(
                                "Transient failure for {} (attempt {}/{}): {}; retrying in {:?}",
                                entry.url.normalized,
                                entry.retries + 1,
                                config.max_retries + 1,
                                err,
                                delay
                            );
                            let mut retry = entry;
                            retry.retries += 1;
                            retry.not_before = Some(Instant::now() + delay);
                            frontier.lock().await.push_retry(retry);
                        }
                        Err(err) => {
                            warn!("Crawl error for {}: {}", entry.url.normalized, err);
                            results.lock().await.push(PageResult::failed(
                                entry.url.normalized.clone(),
                                entry.depth,
                                entry.retries,
                                backend_name,
                                err.to_string(),
                            ));
                        }
                    }

                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }

                debug!("Worker {} finished", worker_id);
            }));
        }

        for joined in futures::future::join_all(handles).await {
            joined?;
        }

        let mut pages = {
            let mut results = results.lock().await;
            std::mem::take(&mut *results)
        };
        let rejected = {
            let mut frontier = frontier.lock().await;
            for entry in frontier.drain() {
                pages.push(PageResult::skipped(entry.url.normalized.clone(), entry.depth));
            }
            frontier.rejections().clone()
        };
        // A cancelled run must not poison the next one.
        self.cancel.store(false, Ordering::SeqCst);

        let succeeded = pages.iter().filter(|p| p.status == PageStatus::Success).count();
        let failed = pages.iter().filter(|p| p.status == PageStatus::Failed).count();
        let skipped = pages.iter().filter(|p| p.status == PageStatus::Skipped).count();
        let summary = CrawlSummary {
            attempted: succeeded + failed,
            succeeded,
            failed,
            skipped,
            rejected,
            elapsed: started.elapsed(),
            pages,
        };
        info!(
            "Crawl complete: {} succeeded, {} failed, {} skipped, {} links rejected in {:?}",
            summary.succeeded,
            summary.failed,
            summary.skipped,
            summary.rejected.total(),
            summary.elapsed
        );
        Ok(summary)
    }
}
