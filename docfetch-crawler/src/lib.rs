pub mod backoff;
pub mod config;
pub mod crawler;
pub mod error;
pub mod fetch;
pub mod frontier;
pub mod result;

pub use config::CrawlConfig;
pub use crawler::Crawler;
pub use error::CrawlError;
pub use fetch::{HrefExtractor, HttpBackend, LinkExtractor};
pub use result::{CrawlSummary, PageResult, PageStatus, RejectionCounts};
