// Frontier: the ordered set of not-yet-fetched URLs, plus the visited set
// and the admission policy that guards entry.
//
// Ordering is shallow-first across depths (bounds memory, spends the page
// budget breadth-first) and FIFO within a depth. The visited set lives inside
// the frontier so check-and-insert happens under the one lock the engine
// already holds - no check-then-act race between workers.

use crate::config::CrawlConfig;
use crate::result::RejectionCounts;
use docfetch_core::url::{UrlDescriptor, UrlKind};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Instant;
use tracing::debug;

/// One pending crawl job.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: UrlDescriptor,
    pub depth: u32,
    /// Normalized URL of the page this link was discovered on.
    pub parent: Option<String>,
    pub retries: u32,
    /// Backoff gate; the entry is not dispatchable before this instant.
    pub not_before: Option<Instant>,
}

/// Outcome of the admission policy for a discovered link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    DepthExceeded,
    Duplicate,
    External,
    Asset,
    PatternExcluded,
    BudgetExhausted,
}

pub struct Frontier {
    queues: BTreeMap<u32, VecDeque<FrontierEntry>>,
    visited: HashSet<String>,
    rejections: RejectionCounts,
    accepted: usize,
    len: usize,
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            queues: BTreeMap::new(),
            visited: HashSet::new(),
            rejections: RejectionCounts::default(),
            accepted: 0,
            len: 0,
        }
    }

    /// Runs the admission policy for a resolved link and enqueues it when it
    /// passes. Rejections are counted, never errored.
    pub fn admit(
        &mut self,
        config: &CrawlConfig,
        url: UrlDescriptor,
        depth: u32,
        parent: Option<String>,
    ) -> Admission {
        if depth > config.max_depth {
            self.rejections.depth_exceeded += 1;
            return Admission::DepthExceeded;
        }
        if url.kind == UrlKind::Asset {
            self.rejections.asset += 1;
            return Admission::Asset;
        }
        if url.kind == UrlKind::External && !config.follow_external {
            self.rejections.external += 1;
            return Admission::External;
        }
        if !config.path_admitted(&url.path) {
            self.rejections.pattern_excluded += 1;
            return Admission::PatternExcluded;
        }
        if self.accepted >= config.max_pages {
            self.rejections.budget_exhausted += 1;
            return Admission::BudgetExhausted;
        }
        // Atomic check-and-insert: the caller holds the frontier lock.
        if !self.visited.insert(url.normalized.clone()) {
            self.rejections.duplicate += 1;
            return Admission::Duplicate;
        }

        debug!(url = %url.normalized, depth, "admitted to frontier");
        self.accepted += 1;
        self.push(FrontierEntry {
            url,
            depth,
            parent,
            retries: 0,
            not_before: None,
        });
        Admission::Accepted
    }

    /// Counts a link the URL model already rejected.
    pub fn count_invalid(&mut self) {
        self.rejections.invalid += 1;
    }

    /// Re-enqueues a job after a transient failure. The entry was admitted
    /// once already, so it bypasses the policy and the budget.
    pub fn push_retry(&mut self, entry: FrontierEntry) {
        self.push(entry);
    }

    fn push(&mut self, entry: FrontierEntry) {
        self.queues.entry(entry.depth).or_default().push_back(entry);
        self.len += 1;
    }

    /// Pops the next dispatchable entry: shallowest depth first, FIFO within
    /// a depth. Entries still inside their backoff window rotate to the back
    /// of their queue instead of blocking it.
    pub fn pop_ready(&mut self, now: Instant) -> Option<FrontierEntry> {
        let depths: Vec<u32> = self.queues.keys().copied().collect();
        for depth in depths {
            let Some(queue) = self.queues.get_mut(&depth) else {
                continue;
            };
            let mut rotations = 0;
            let limit = queue.len();
            while rotations < limit {
                let Some(entry) = queue.pop_front() else {
                    break;
                };
                let ready = entry.not_before.is_none_or(|gate| gate <= now);
                if ready {
                    if queue.is_empty() {
                        self.queues.remove(&depth);
                    }
                    self.len -= 1;
                    return Some(entry);
                }
                queue.push_back(entry);
                rotations += 1;
            }
        }
        None
    }

    /// Removes and returns everything still pending; used to mark the
    /// remainder as skipped at termination.
    pub fn drain(&mut self) -> Vec<FrontierEntry> {
        let mut remaining = Vec::with_capacity(self.len);
        for (_, mut queue) in std::mem::take(&mut self.queues) {
            remaining.extend(queue.drain(..));
        }
        self.len = 0;
        remaining
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Jobs accepted over the whole run (dispatched or still pending).
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejections(&self) -> &RejectionCounts {
        &self.rejections
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}
