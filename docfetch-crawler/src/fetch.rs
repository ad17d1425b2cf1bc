// Default HTTP fetch backend (reqwest) and the default href extractor.

use async_trait::async_trait;
use docfetch_core::backend::{FetchBackend, FetchError, FetchOptions, FetchResponse};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Plain HTTP backend backed by a pooled reqwest client. Does not render
/// JavaScript; a backend that does can be registered alongside it.
pub struct HttpBackend {
    client: Client,
}

impl HttpBackend {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .http2_adaptive_window(true)
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }
}

#[async_trait]
impl FetchBackend for HttpBackend {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchResponse, FetchError> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .timeout(options.timeout)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status().as_u16();
        if let Some(err) = classify_status(status) {
            return Err(err);
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();

        let body = response.text().await.map_err(classify_reqwest)?;

        Ok(FetchResponse {
            status,
            content_type,
            headers,
            body,
            elapsed: start.elapsed(),
        })
    }
}

/// Maps an HTTP status to a fetch failure: 429 and 5xx are transient, other
/// 4xx are permanent, everything else is a success.
fn classify_status(status: u16) -> Option<FetchError> {
    match status {
        429 => Some(FetchError::Transient(format!("origin rate limited ({status})"))),
        500..=599 => Some(FetchError::Transient(format!("server error ({status})"))),
        400..=499 => Some(FetchError::Permanent(format!("client error ({status})"))),
        _ => None,
    }
}

/// Timeouts, connect failures and mid-body resets are worth retrying; request
/// construction and redirect-policy failures are not.
fn classify_reqwest(err: reqwest::Error) -> FetchError {
    if err.is_timeout() || err.is_connect() || err.is_body() || err.is_decode() {
        FetchError::Transient(err.to_string())
    } else {
        FetchError::Permanent(err.to_string())
    }
}

/// Seam for the content-extraction collaborator: given a raw body, yield the
/// outbound links. The engine resolves and admits them; it never re-parses
/// the body itself.
pub trait LinkExtractor: Send + Sync {
    fn extract(&self, body: &str, content_type: Option<&str>) -> Vec<String>;
}

/// Default extractor: `a[href]` from HTML documents, raw hrefs as written.
/// Non-HTML bodies yield nothing.
pub struct HrefExtractor;

impl LinkExtractor for HrefExtractor {
    fn extract(&self, body: &str, content_type: Option<&str>) -> Vec<String> {
        let is_html = content_type
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);
        if !is_html {
            return Vec::new();
        }

        let document = Html::parse_document(body);
        let selector = Selector::parse("a[href]").unwrap();
        document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .map(|href| href.to_string())
            .collect()
    }
}
