//! `kmlcrawl <source>`: crawl NetworkLinks and print every placemark.

use crate::cli::output::{self, Styled};
use crate::{CrawlConfig, CrawlManager, CrawlReport, DocumentSource, Placemark};
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::time::Instant;
use tracing::warn;

/// Options for one crawl invocation.
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Seed path or URL.
    pub source: String,
    /// Load only the seed document.
    pub no_follow: bool,
    pub max_links: Option<usize>,
    pub max_depth: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub delay_ms: Option<u64>,
    pub fail_fast: bool,
    /// Attribute table fields to report; empty means every row.
    pub fields: Vec<String>,
    pub json: bool,
    pub quiet: bool,
}

impl CrawlOptions {
    /// Environment-derived config with command-line flags applied on top.
    pub fn config(&self) -> CrawlConfig {
        let mut config = CrawlConfig::from_env();
        if let Some(n) = self.max_links {
            config = config.with_max_links(n);
        }
        if let Some(n) = self.max_depth {
            config = config.with_max_depth(n);
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_fetch_timeout_ms(ms);
        }
        if let Some(ms) = self.delay_ms {
            config = config.with_min_delay_ms(ms);
        }
        if self.fail_fast {
            config = config.with_fail_fast(true);
        }
        config
    }
}

/// Run the crawl command.
pub async fn run(opts: &CrawlOptions) -> Result<()> {
    let s = Styled::new();
    let start = Instant::now();

    let mut manager =
        CrawlManager::from_config(opts.config()).context("failed to set up HTTP client")?;
    let source = DocumentSource::parse(&opts.source)?;
    manager
        .seed(&source)
        .await
        .with_context(|| format!("failed to load {}", source.location()))?;

    let report = if opts.no_follow {
        None
    } else {
        Some(
            manager
                .explore_all()
                .await
                .context("crawl aborted on a failed NetworkLink")?,
        )
    };

    let placemarks = manager.all_placemarks().to_vec();

    if opts.json {
        let records: Vec<Value> = placemarks
            .iter()
            .map(|p| placemark_json(p, &opts.fields))
            .collect();
        output::print_json(&Value::Array(records));
    } else {
        for placemark in &placemarks {
            println!("{}", output::tsv_line(&placemark_row(placemark, &opts.fields)));
        }
    }

    if !opts.quiet {
        print_summary(&s, &manager, report.as_ref(), placemarks.len(), start);
    }

    Ok(())
}

/// JSON record for one placemark. Requested fields missing from the table
/// are reported as `null`.
pub fn placemark_json(placemark: &Placemark, fields: &[String]) -> Value {
    let mut attributes = Map::new();
    if fields.is_empty() {
        for (key, value) in placemark.attributes() {
            attributes.entry(key).or_insert(Value::String(value));
        }
    } else {
        for field in fields {
            let value = match placemark.attribute(field) {
                Ok(v) => Value::String(v),
                Err(e) => {
                    warn!("{e}");
                    Value::Null
                }
            };
            attributes.insert(field.clone(), value);
        }
    }

    json!({
        "name": placemark.name,
        "latitude": placemark.latitude,
        "longitude": placemark.longitude,
        "located": placemark.located,
        "attributes": attributes,
    })
}

/// TSV columns: latitude, longitude, name, then the requested fields.
pub fn placemark_row(placemark: &Placemark, fields: &[String]) -> Vec<String> {
    let mut row = vec![
        placemark.latitude.to_string(),
        placemark.longitude.to_string(),
        placemark.name.clone().unwrap_or_default(),
    ];
    row.extend(
        fields
            .iter()
            .map(|f| placemark.attribute(f).unwrap_or_default()),
    );
    row
}

fn print_summary(
    s: &Styled,
    manager: &CrawlManager,
    report: Option<&CrawlReport>,
    placemarks: usize,
    start: Instant,
) {
    output::print_header(s);
    output::print_check(
        s.ok_sym(),
        "Documents",
        &manager.documents().len().to_string(),
    );
    output::print_check(s.ok_sym(), "Placemarks", &placemarks.to_string());

    if let Some(report) = report {
        if report.pending > 0 || report.beyond_depth > 0 {
            output::print_check(
                s.warn_sym(),
                "Not followed",
                &format!(
                    "{} over link limit, {} over depth limit",
                    report.pending, report.beyond_depth
                ),
            );
        }
    }

    for failure in manager.failures() {
        output::print_check(s.fail_sym(), "Failed", &failure.url);
        eprintln!("                        {}", s.dim(&failure.error));
    }

    eprintln!();
    eprintln!(
        "  Done in {}",
        output::format_duration_ms(start.elapsed().as_millis() as u64)
    );
}
