//! Byte fetching for remote KML/KMZ resources.

use crate::config::CrawlConfig;
use crate::error::{KmlError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Retrieves the raw bytes behind a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP(S) fetcher backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client with the configured timeout and user agent.
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| KmlError::InvalidArgument(format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KmlError::fetch(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(KmlError::fetch(url, format!("HTTP {status}")));
        }

        let body = resp.bytes().await.map_err(|e| KmlError::fetch(url, e))?;
        debug!("fetched {} bytes from {url}", body.len());
        Ok(body.to_vec())
    }
}

/// Offline [`Fetcher`] that serves canned bodies from memory and counts
/// requests per URL.
///
/// Useful for crawling a pre-downloaded set of documents, or for exercising a
/// [`crate::CrawlManager`] without network access. Unknown URLs fail with
/// [`KmlError::Fetch`], like an HTTP 404.
///
/// ```
/// # async fn demo() -> kmlcrawl::Result<()> {
/// use kmlcrawl::{DocumentSource, Loader, MemoryFetcher};
/// use std::sync::Arc;
///
/// let fetcher = Arc::new(MemoryFetcher::new().with_body(
///     "http://mirror/root.kml",
///     r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document/></kml>"#,
/// ));
/// let loader = Loader::new(fetcher.clone());
/// DocumentSource::remote("http://mirror/root.kml").load(&loader).await?;
/// assert_eq!(fetcher.hits("http://mirror/root.kml"), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    bodies: HashMap<String, Vec<u8>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    /// How many times `url` has been requested.
    pub fn hits(&self, url: &str) -> usize {
        self.hits
            .lock()
            .map(|h| h.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Ok(mut hits) = self.hits.lock() {
            *hits.entry(url.to_string()).or_default() += 1;
        }
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| KmlError::fetch(url, "HTTP 404 Not Found"))
    }
}
