//! Document sources: turn a local path or a URL into a parsed [`KmlDocument`].
//!
//! Remote downloads and KMZ extraction are staged in a per-load temporary
//! directory that is removed when the load finishes, whether it succeeded or not.

use crate::acquisition::archive;
use crate::acquisition::http_client::{Fetcher, HttpFetcher};
use crate::config::CrawlConfig;
use crate::document::kml::{filename_from_url, KmlDocument};
use crate::error::{KmlError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

const DOWNLOAD_KML: &str = "download.kml";
const DOWNLOAD_KMZ: &str = "download.kmz";
const UNPACK_DIR: &str = "unpacked";

/// Where a KML/KMZ document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Local(PathBuf),
    Remote(String),
}

impl DocumentSource {
    /// Build a source from exactly one of a local path or a URL.
    pub fn new(local_path: Option<PathBuf>, url: Option<String>) -> Result<Self> {
        match (local_path, url) {
            (Some(path), None) => Ok(Self::Local(path)),
            (None, Some(url)) => Ok(Self::Remote(url)),
            (Some(_), Some(_)) => Err(KmlError::InvalidArgument(
                "cannot load from both a local path and a URL".to_string(),
            )),
            (None, None) => Err(KmlError::InvalidArgument(
                "either a local path or a URL is required".to_string(),
            )),
        }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local(path.into())
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote(url.into())
    }

    /// Classify a command-line argument or href.
    ///
    /// `http(s)://` is remote, `file://` and bare paths are local. Any other
    /// scheme is an [`KmlError::InvalidArgument`].
    pub fn parse(arg: &str) -> Result<Self> {
        let Some((scheme, _)) = arg.split_once("://") else {
            return Ok(Self::local(arg));
        };
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Ok(Self::local(arg));
        }

        match scheme.to_ascii_lowercase().as_str() {
            "http" | "https" => Ok(Self::remote(arg)),
            "file" => url::Url::parse(arg)
                .ok()
                .and_then(|u| u.to_file_path().ok())
                .map(Self::Local)
                .ok_or_else(|| KmlError::InvalidArgument(format!("invalid file URL: {arg}"))),
            other => Err(KmlError::InvalidArgument(format!(
                "unsupported URL scheme {other:?} in {arg}"
            ))),
        }
    }

    /// Display form of the path or URL.
    pub fn location(&self) -> String {
        match self {
            Self::Local(path) => path.display().to_string(),
            Self::Remote(url) => url.clone(),
        }
    }

    /// Whether the source is named like a KMZ package.
    pub fn is_kmz(&self) -> bool {
        match self {
            Self::Local(path) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("kmz")),
            Self::Remote(url) => strip_query(url).to_ascii_lowercase().ends_with(".kmz"),
        }
    }

    /// Fetch and parse this source.
    pub async fn load(&self, loader: &Loader) -> Result<KmlDocument> {
        loader.load(self).await
    }
}

/// Loads [`DocumentSource`]s using a [`Fetcher`] for remote bytes.
#[derive(Clone)]
pub struct Loader {
    fetcher: Arc<dyn Fetcher>,
    temp_root: Option<PathBuf>,
}

impl Loader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            temp_root: None,
        }
    }

    /// HTTP loader honoring the config's timeout, user agent, and temp root.
    pub fn from_config(config: &CrawlConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config)?;
        let mut loader = Self::new(Arc::new(fetcher));
        loader.temp_root = config.temp_root.clone();
        Ok(loader)
    }

    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    pub async fn load(&self, source: &DocumentSource) -> Result<KmlDocument> {
        match source {
            DocumentSource::Local(path) => self.load_local(path, source.is_kmz()).await,
            DocumentSource::Remote(url) => self.load_remote(url, source.is_kmz()).await,
        }
    }

    async fn load_local(&self, path: &Path, named_kmz: bool) -> Result<KmlDocument> {
        let location = path.display().to_string();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| KmlError::fetch(&location, e))?;

        if named_kmz || archive::is_zip(&bytes) {
            let scratch = self.scratch_dir()?;
            let kml = unpack(path.to_path_buf(), scratch.path().to_path_buf()).await?;
            return KmlDocument::from_bytes(&kml, location);
        }

        KmlDocument::from_bytes(&bytes, location)
    }

    async fn load_remote(&self, url: &str, named_kmz: bool) -> Result<KmlDocument> {
        // Acquired before the fetch so every exit path below releases it.
        let scratch = self.scratch_dir()?;
        info!(
            "downloading {} from {url}",
            filename_from_url(strip_query(url)).unwrap_or("document")
        );

        let bytes = self.fetcher.fetch(url).await?;

        let document = if named_kmz || archive::is_zip(&bytes) {
            // Fixed names: URL segments can be too long or clash with the unpack dir.
            let download = scratch.path().join(DOWNLOAD_KMZ);
            tokio::fs::write(&download, &bytes).await?;
            let kml = unpack(download, scratch.path().join(UNPACK_DIR)).await?;
            KmlDocument::from_bytes(&kml, url)?
        } else {
            tokio::fs::write(scratch.path().join(DOWNLOAD_KML), &bytes).await?;
            KmlDocument::from_bytes(&bytes, url)?
        };

        debug!("releasing {}", scratch.path().display());
        Ok(document)
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("kmlcrawl-");
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

/// Extract `doc.kml` on the blocking pool and return its bytes.
async fn unpack(archive_path: PathBuf, dest_dir: PathBuf) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let doc = archive::extract_doc_kml(&archive_path, &dest_dir)?;
        Ok::<_, KmlError>(std::fs::read(doc)?)
    })
    .await
    .map_err(|e| KmlError::Parse(format!("archive extraction task failed: {e}")))?
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}
