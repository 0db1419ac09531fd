//! Follow KML/KMZ `NetworkLink`s to closure and flatten every `Placemark`
//! into a geocoded record with its embedded attribute table.
//!
//! ```no_run
//! use kmlcrawl::{CrawlConfig, CrawlManager, DocumentSource};
//!
//! # async fn run() -> kmlcrawl::Result<()> {
//! let mut manager = CrawlManager::from_config(CrawlConfig::default())?;
//! manager.seed(&DocumentSource::parse("root.kml")?).await?;
//! manager.explore_all().await?;
//! for placemark in manager.all_placemarks() {
//!     println!("{} {}", placemark.latitude, placemark.longitude);
//! }
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod document;
pub mod error;
pub mod extraction;

pub use acquisition::http_client::{Fetcher, HttpFetcher, MemoryFetcher};
pub use acquisition::source::{DocumentSource, Loader};
pub use config::CrawlConfig;
pub use crawl::manager::{CrawlFailure, CrawlManager, CrawlReport, QueuedLink};
pub use document::kml::{filename_from_url, KmlDocument};
pub use error::{KmlError, Result};
pub use extraction::placemark::{
    extract_attribute_table, extract_coordinates, get_attribute, Placemark,
};
