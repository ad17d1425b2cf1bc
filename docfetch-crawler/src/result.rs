use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Terminal state of one crawl job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Success,
    Failed,
    Skipped,
}

/// Per-page outcome handed to downstream ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// Normalized URL of the page.
    pub url: String,
    pub status: PageStatus,
    pub http_status: Option<u16>,
    pub content_type: Option<String>,
    /// Raw body; content extraction happens downstream.
    pub content: Option<String>,
    /// Links that were admitted into the frontier from this page.
    pub links: Vec<String>,
    pub error: Option<String>,
    pub elapsed: Duration,
    /// Name of the backend that served the fetch.
    pub backend: String,
    pub depth: u32,
    pub retries: u32,
}

impl PageResult {
    pub fn failed(url: String, depth: u32, retries: u32, backend: String, error: String) -> Self {
        Self {
            url,
            status: PageStatus::Failed,
            http_status: None,
            content_type: None,
            content: None,
            links: Vec::new(),
            error: Some(error),
            elapsed: Duration::ZERO,
            backend,
            depth,
            retries,
        }
    }

    pub fn skipped(url: String, depth: u32) -> Self {
        Self {
            url,
            status: PageStatus::Skipped,
            http_status: None,
            content_type: None,
            content: None,
            links: Vec::new(),
            error: None,
            elapsed: Duration::ZERO,
            backend: String::new(),
            depth,
            retries: 0,
        }
    }
}

/// Links that never entered the frontier, counted by admission-policy reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    /// URL model rejections (bad scheme, traversal, denylist, ...).
    pub invalid: usize,
    pub depth_exceeded: usize,
    pub duplicate: usize,
    pub external: usize,
    pub asset: usize,
    pub pattern_excluded: usize,
    pub budget_exhausted: usize,
}

impl RejectionCounts {
    pub fn total(&self) -> usize {
        self.invalid
            + self.depth_exceeded
            + self.duplicate
            + self.external
            + self.asset
            + self.pattern_excluded
            + self.budget_exhausted
    }
}

/// Aggregate outcome of a crawl run. A run always completes with a summary;
/// per-page failures are counted here, never raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    /// Jobs dispatched to a backend at least once.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rejected: RejectionCounts,
    pub elapsed: Duration,
    pub pages: Vec<PageResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_total() {
        let counts = RejectionCounts {
            invalid: 2,
            duplicate: 3,
            external: 1,
            ..Default::default()
        };
        assert_eq!(counts.total(), 6);
    }

    #[test]
    fn test_summary_serializes_for_downstream() {
        let summary = CrawlSummary {
            attempted: 1,
            succeeded: 1,
            failed: 0,
            skipped: 0,
            rejected: RejectionCounts::default(),
            elapsed: Duration::from_millis(42),
            pages: vec![PageResult::skipped("https://example.com/".to_string(), 0)],
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"succeeded\":1"));
        assert!(json.contains("\"skipped\""));
    }
}
