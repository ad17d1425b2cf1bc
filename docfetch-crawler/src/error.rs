use docfetch_core::url::UrlRejection;
use thiserror::Error;

/// Errors that prevent a crawl run from starting or completing. Per-page
/// failures never surface here - they land in the summary.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid crawl configuration: {0}")]
    Config(String),

    #[error("seed URL rejected: {0}")]
    Seed(#[from] UrlRejection),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
