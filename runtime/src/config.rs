//! Crawl configuration: defaults, environment overlay, and builder methods.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-request fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Settings that bound and shape a crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Per-request timeout for remote fetches.
    pub fetch_timeout_ms: u64,
    /// User-Agent header sent with remote fetches.
    pub user_agent: String,
    /// Maximum number of linked documents to load (the seed is not counted).
    pub max_links: Option<usize>,
    /// Maximum link depth to follow; links found in the seed are depth 1.
    pub max_depth: Option<usize>,
    /// Minimum delay between consecutive fetches.
    pub min_delay_ms: u64,
    /// Abort the crawl on the first failed link instead of recording it.
    pub fail_fast: bool,
    /// Directory under which per-download temporary directories are created.
    /// Defaults to the system temp directory.
    pub temp_root: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            user_agent: format!("kmlcrawl/{}", env!("CARGO_PKG_VERSION")),
            max_links: None,
            max_depth: None,
            min_delay_ms: 0,
            fail_fast: false,
            temp_root: None,
        }
    }
}

impl CrawlConfig {
    /// Defaults overlaid with `KMLCRAWL_*` environment variables.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ms) = lookup("KMLCRAWL_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.fetch_timeout_ms = ms;
        }
        if let Some(ua) = lookup("KMLCRAWL_USER_AGENT").filter(|v| !v.is_empty()) {
            self.user_agent = ua;
        }
        if let Some(n) = lookup("KMLCRAWL_MAX_LINKS").and_then(|v| v.parse().ok()) {
            self.max_links = Some(n);
        }
        if let Some(n) = lookup("KMLCRAWL_MAX_DEPTH").and_then(|v| v.parse().ok()) {
            self.max_depth = Some(n);
        }
        if let Some(ms) = lookup("KMLCRAWL_MIN_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.min_delay_ms = ms;
        }
        if let Some(flag) = lookup("KMLCRAWL_FAIL_FAST") {
            self.fail_fast = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(dir) = lookup("KMLCRAWL_TEMP_DIR").filter(|v| !v.is_empty()) {
            self.temp_root = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn with_fetch_timeout_ms(mut self, ms: u64) -> Self {
        self.fetch_timeout_ms = ms;
        self
    }

    pub fn with_max_links(mut self, max_links: usize) -> Self {
        self.max_links = Some(max_links);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_min_delay_ms(mut self, ms: u64) -> Self {
        self.min_delay_ms = ms;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overlay(vars: &[(&str, &str)]) -> CrawlConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CrawlConfig::default().overlay(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = CrawlConfig::default();
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert!(config.max_links.is_none());
        assert!(config.max_depth.is_none());
        assert!(!config.fail_fast);
        assert!(config.user_agent.starts_with("kmlcrawl/"));
    }

    #[test]
    fn test_env_overlay() {
        let config = overlay(&[
            ("KMLCRAWL_TIMEOUT_MS", "500"),
            ("KMLCRAWL_MAX_LINKS", "40"),
            ("KMLCRAWL_MAX_DEPTH", "2"),
            ("KMLCRAWL_FAIL_FAST", "true"),
            ("KMLCRAWL_TEMP_DIR", "/var/tmp/kml"),
        ]);
        assert_eq!(config.fetch_timeout_ms, 500);
        assert_eq!(config.max_links, Some(40));
        assert_eq!(config.max_depth, Some(2));
        assert!(config.fail_fast);
        assert_eq!(config.temp_root, Some(PathBuf::from("/var/tmp/kml")));
    }

    #[test]
    fn test_env_overlay_ignores_garbage() {
        let config = overlay(&[("KMLCRAWL_MAX_LINKS", "lots"), ("KMLCRAWL_TIMEOUT_MS", "")]);
        assert_eq!(config, CrawlConfig::default());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: CrawlConfig = serde_json::from_str(r#"{"max_links": 5}"#).unwrap();
        assert_eq!(config.max_links, Some(5));
        assert_eq!(config.fetch_timeout_ms, DEFAULT_FETCH_TIMEOUT_MS);
    }
}
