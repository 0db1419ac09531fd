//! Breadth-first NetworkLink crawl over KML/KMZ documents.

use crate::acquisition::source::{DocumentSource, Loader};
use crate::config::CrawlConfig;
use crate::crawl::rate_limiter::RateLimiter;
use crate::document::kml::KmlDocument;
use crate::error::Result;
use crate::extraction::placemark::Placemark;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A link waiting in the frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedLink {
    pub url: String,
    /// Number of NetworkLink hops from the seed.
    pub depth: usize,
}

/// A link whose document could not be loaded.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlFailure {
    pub url: String,
    pub depth: usize,
    pub error: String,
}

/// Summary of one `explore_all` run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Documents held by the manager, seeds included.
    pub documents: usize,
    /// Links dequeued and attempted during this run.
    pub attempted: usize,
    /// Links that failed to load during this run.
    pub failed: usize,
    /// Links left in the frontier because the link limit was reached.
    pub pending: usize,
    /// Links never queued because they were beyond the depth limit.
    pub beyond_depth: usize,
}

/// Holds the frontier, the visited set, and every loaded document.
pub struct CrawlManager {
    loader: Loader,
    config: CrawlConfig,
    rate_limiter: RateLimiter,
    documents: Vec<KmlDocument>,
    frontier: VecDeque<QueuedLink>,
    /// Every link ever queued or seeded; guards against re-queueing.
    seen: HashSet<String>,
    visited: HashSet<String>,
    placemarks: Vec<Placemark>,
    failures: Vec<CrawlFailure>,
    links_loaded: usize,
    beyond_depth: usize,
}

impl CrawlManager {
    pub fn new(loader: Loader, config: CrawlConfig) -> Self {
        let rate_limiter = RateLimiter::new(config.min_delay_ms);
        Self {
            loader,
            config,
            rate_limiter,
            documents: Vec::new(),
            frontier: VecDeque::new(),
            seen: HashSet::new(),
            visited: HashSet::new(),
            placemarks: Vec::new(),
            failures: Vec::new(),
            links_loaded: 0,
            beyond_depth: 0,
        }
    }

    /// Manager with an HTTP loader built from `config`.
    pub fn from_config(config: CrawlConfig) -> Result<Self> {
        let loader = Loader::from_config(&config)?;
        Ok(Self::new(loader, config))
    }

    /// Load the seed document and queue its links.
    ///
    /// A seed that fails to load is an error; nothing is registered.
    pub async fn seed(&mut self, source: &DocumentSource) -> Result<()> {
        let document = source.load(&self.loader).await?;
        self.seen.insert(source.location());
        self.add_document(document);
        Ok(())
    }

    /// Register an already-loaded document and queue its links.
    pub fn add_document(&mut self, document: KmlDocument) {
        self.push_document(document, 0);
    }

    fn push_document(&mut self, document: KmlDocument, depth: usize) {
        let links = document.network_links();
        debug!("{}: {} NetworkLinks", document.location(), links.len());

        for url in links {
            if !self.seen.insert(url.clone()) {
                debug!("already seen {url}");
                continue;
            }
            let link_depth = depth + 1;
            if self.config.max_depth.is_some_and(|max| link_depth > max) {
                debug!("not following {url}: depth {link_depth} beyond limit");
                self.beyond_depth += 1;
                continue;
            }
            self.frontier.push_back(QueuedLink {
                url,
                depth: link_depth,
            });
        }

        self.documents.push(document);
    }

    /// Follow links breadth-first until the frontier is empty or the link
    /// limit is reached.
    ///
    /// Each link is loaded at most once. A failed link stays visited and is
    /// recorded in [`CrawlManager::failures`], unless `fail_fast` is set, in
    /// which case the error is returned and the crawl stops.
    pub async fn explore_all(&mut self) -> Result<CrawlReport> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let beyond_depth_before = self.beyond_depth;
        let failures_before = self.failures.len();
        let mut attempted = 0;

        while let Some(next) = self.frontier.front().cloned() {
            if self.config.max_links.is_some_and(|max| self.links_loaded >= max) {
                warn!(
                    "link limit reached, {} links left unfetched",
                    self.frontier.len()
                );
                break;
            }
            self.frontier.pop_front();

            // Links are deduplicated through `seen` at enqueue time, so this
            // insert always succeeds.
            let first_visit = self.visited.insert(next.url.clone());
            debug_assert!(first_visit, "{} queued twice", next.url);

            self.rate_limiter.acquire().await;
            attempted += 1;
            self.links_loaded += 1;

            let loaded = match DocumentSource::parse(&next.url) {
                Ok(source) => source.load(&self.loader).await,
                Err(e) => Err(e),
            };
            match loaded {
                Ok(document) => {
                    info!("loaded {} (depth {})", next.url, next.depth);
                    self.push_document(document, next.depth);
                }
                Err(e) if self.config.fail_fast => return Err(e),
                Err(e) => {
                    warn!("failed to load {}: {e}", next.url);
                    self.failures.push(CrawlFailure {
                        url: next.url,
                        depth: next.depth,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "crawl finished: {} documents, {} failed links",
            self.documents.len(),
            self.failures.len()
        );

        Ok(CrawlReport {
            started_at,
            finished_at: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as u64,
            documents: self.documents.len(),
            attempted,
            failed: self.failures.len() - failures_before,
            pending: self.frontier.len(),
            beyond_depth: self.beyond_depth - beyond_depth_before,
        })
    }

    /// Extract every placemark from every document, in discovery order then
    /// document order. The result is cached in [`CrawlManager::placemarks`].
    pub fn all_placemarks(&mut self) -> &[Placemark] {
        self.placemarks = self
            .documents
            .iter()
            .flat_map(|document| document.placemarks())
            .collect();
        info!("total placemarks: {}", self.placemarks.len());
        &self.placemarks
    }

    pub fn documents(&self) -> &[KmlDocument] {
        &self.documents
    }

    /// Links discovered but not yet fetched, oldest first.
    pub fn frontier(&self) -> impl Iterator<Item = &QueuedLink> {
        self.frontier.iter()
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    /// Placemarks from the last [`CrawlManager::all_placemarks`] call.
    pub fn placemarks(&self) -> &[Placemark] {
        &self.placemarks
    }

    pub fn failures(&self) -> &[CrawlFailure] {
        &self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::http_client::MemoryFetcher;
    use crate::error::KmlError;
    use std::sync::Arc;

    fn kml(links: &[&str], placemarks: &[&str]) -> String {
        let links: String = links
            .iter()
            .map(|l| format!("<NetworkLink><Link><href>{l}</href></Link></NetworkLink>"))
            .collect();
        let marks: String = placemarks
            .iter()
            .map(|n| {
                format!(
                    "<Placemark><name>{n}</name><Point><coordinates>1.5,2.5,0</coordinates></Point></Placemark>"
                )
            })
            .collect();
        format!(r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document>{links}{marks}</Document></kml>"#)
    }

    fn manager(fetcher: Arc<MemoryFetcher>, config: CrawlConfig) -> CrawlManager {
        CrawlManager::new(Loader::new(fetcher), config)
    }

    #[tokio::test]
    async fn test_seed_queues_links() {
        let fetcher = Arc::new(
            MemoryFetcher::new().with_body("http://k/root.kml", kml(&["http://k/a.kmz"], &[])),
        );
        let mut manager = manager(fetcher, CrawlConfig::default());
        manager.seed(&DocumentSource::remote("http://k/root.kml")).await.unwrap();

        assert_eq!(manager.documents().len(), 1);
        let frontier: Vec<&str> = manager.frontier().map(|l| l.url.as_str()).collect();
        assert_eq!(frontier, vec!["http://k/a.kmz"]);
        assert!(manager.visited().is_empty());
    }

    #[tokio::test]
    async fn test_seed_failure_propagates() {
        let mut manager = manager(Arc::new(MemoryFetcher::new()), CrawlConfig::default());
        let err = manager
            .seed(&DocumentSource::remote("http://k/missing.kml"))
            .await
            .unwrap_err();
        assert!(matches!(err, KmlError::Fetch { .. }));
        assert!(manager.documents().is_empty());
    }

    #[tokio::test]
    async fn test_explore_all_visits_each_link_once() {
        // root -> a, b; a -> b, c; b -> a, root; c -> a
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with_body("http://k/root.kml", kml(&["http://k/a.kml", "http://k/b.kml"], &["r"]))
                .with_body("http://k/a.kml", kml(&["http://k/b.kml", "http://k/c.kml"], &["a"]))
                .with_body("http://k/b.kml", kml(&["http://k/a.kml", "http://k/root.kml"], &["b"]))
                .with_body("http://k/c.kml", kml(&["http://k/a.kml"], &["c"])),
        );
        let mut manager = manager(fetcher.clone(), CrawlConfig::default());
        manager.seed(&DocumentSource::remote("http://k/root.kml")).await.unwrap();
        let report = manager.explore_all().await.unwrap();

        assert_eq!(report.documents, 4);
        assert_eq!(report.attempted, 3);
        assert_eq!(manager.visited().len(), 3);
        for url in ["http://k/root.kml", "http://k/a.kml", "http://k/b.kml", "http://k/c.kml"] {
            assert_eq!(fetcher.hits(url), 1, "{url}");
        }
        assert_eq!(manager.frontier().count(), 0);

        let locations: Vec<&str> = manager.documents().iter().map(|d| d.location()).collect();
        assert_eq!(
            locations,
            vec!["http://k/root.kml", "http://k/a.kml", "http://k/b.kml", "http://k/c.kml"]
        );
    }

    #[tokio::test]
    async fn test_failures_are_recorded_and_crawl_continues() {
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with_body("http://k/root.kml", kml(&["http://k/gone.kml", "http://k/a.kml"], &[]))
                .with_body("http://k/a.kml", kml(&[], &["a"])),
        );
        let mut manager = manager(fetcher, CrawlConfig::default());
        manager.seed(&DocumentSource::remote("http://k/root.kml")).await.unwrap();
        let report = manager.explore_all().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.documents, 2);
        assert_eq!(manager.failures()[0].url, "http://k/gone.kml");
        assert!(manager.visited().contains("http://k/gone.kml"));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_recorded() {
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with_body("http://k/root.kml", kml(&["ftp://k/a.kml", "http://k/b.kml"], &[]))
                .with_body("http://k/b.kml", kml(&[], &["b"])),
        );
        let mut manager = manager(fetcher, CrawlConfig::default());
        manager.seed(&DocumentSource::remote("http://k/root.kml")).await.unwrap();
        let report = manager.explore_all().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.documents, 2);
        assert_eq!(manager.failures()[0].url, "ftp://k/a.kml");
        assert!(manager.failures()[0].error.contains("unsupported URL scheme"));
    }

    #[tokio::test]
    async fn test_fail_fast_aborts() {
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with_body("http://k/root.kml", kml(&["http://k/gone.kml", "http://k/a.kml"], &[]))
                .with_body("http://k/a.kml", kml(&[], &[])),
        );
        let mut manager = manager(fetcher.clone(), CrawlConfig::default().with_fail_fast(true));
        manager.seed(&DocumentSource::remote("http://k/root.kml")).await.unwrap();

        assert!(matches!(manager.explore_all().await, Err(KmlError::Fetch { .. })));
        assert_eq!(fetcher.hits("http://k/a.kml"), 0);
        assert!(manager.visited().contains("http://k/gone.kml"));
    }

    #[tokio::test]
    async fn test_max_links_leaves_frontier_pending() {
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with_body(
                    "http://k/root.kml",
                    kml(&["http://k/a.kml", "http://k/b.kml", "http://k/c.kml"], &[]),
                )
                .with_body("http://k/a.kml", kml(&[], &[]))
                .with_body("http://k/b.kml", kml(&[], &[])),
        );
        let mut manager = manager(fetcher.clone(), CrawlConfig::default().with_max_links(2));
        manager.seed(&DocumentSource::remote("http://k/root.kml")).await.unwrap();
        let report = manager.explore_all().await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.pending, 1);
        assert_eq!(fetcher.hits("http://k/c.kml"), 0);
        let pending: Vec<&str> = manager.frontier().map(|l| l.url.as_str()).collect();
        assert_eq!(pending, vec!["http://k/c.kml"]);
    }

    #[tokio::test]
    async fn test_max_depth() {
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with_body("http://k/root.kml", kml(&["http://k/a.kml"], &[]))
                .with_body("http://k/a.kml", kml(&["http://k/b.kml"], &[]))
                .with_body("http://k/b.kml", kml(&[], &[])),
        );
        let mut manager = manager(fetcher.clone(), CrawlConfig::default().with_max_depth(1));
        manager.seed(&DocumentSource::remote("http://k/root.kml")).await.unwrap();
        let report = manager.explore_all().await.unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(report.beyond_depth, 1);
        assert_eq!(fetcher.hits("http://k/b.kml"), 0);
    }

    #[tokio::test]
    async fn test_all_placemarks_in_discovery_order() {
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with_body("http://k/root.kml", kml(&["http://k/a.kml"], &["r1", "r2"]))
                .with_body("http://k/a.kml", kml(&[], &["a1"])),
        );
        let mut manager = manager(fetcher, CrawlConfig::default());
        manager.seed(&DocumentSource::remote("http://k/root.kml")).await.unwrap();
        manager.explore_all().await.unwrap();

        let names: Vec<String> = manager
            .all_placemarks()
            .iter()
            .filter_map(|p| p.name.clone())
            .collect();
        assert_eq!(names, vec!["r1", "r2", "a1"]);
        assert_eq!(manager.placemarks().len(), 3);
        assert!(manager.placemarks().iter().all(|p| p.located && p.latitude == 1.5));
    }

    #[test]
    fn test_add_document_queues_links() {
        let mut manager = manager(Arc::new(MemoryFetcher::new()), CrawlConfig::default());
        let doc = KmlDocument::from_bytes(
            kml(&["http://k/a.kml", "http://k/a.kml"], &[]).as_bytes(),
            "inline.kml",
        )
        .unwrap();
        manager.add_document(doc);

        assert_eq!(manager.documents().len(), 1);
        assert_eq!(manager.frontier().count(), 1);
    }
}
