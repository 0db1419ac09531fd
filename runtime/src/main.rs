use anyhow::Result;
use clap::Parser;
use kmlcrawl::cli::crawl_cmd::{self, CrawlOptions};

/// Follow KML/KMZ NetworkLinks and print every placemark.
#[derive(Parser, Debug)]
#[command(name = "kmlcrawl", version, about)]
struct Cli {
    /// Seed KML/KMZ file path or http(s) URL.
    source: String,

    /// Load only the seed document; do not follow NetworkLinks.
    #[arg(long)]
    no_follow: bool,

    /// Maximum number of linked documents to load.
    #[arg(long)]
    max_links: Option<usize>,

    /// Maximum NetworkLink depth to follow.
    #[arg(long)]
    max_depth: Option<usize>,

    /// Per-request fetch timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Minimum delay between fetches in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Abort on the first NetworkLink that fails to load.
    #[arg(long)]
    fail_fast: bool,

    /// Attribute table field to report (repeatable).
    #[arg(long = "field", value_name = "NAME")]
    fields: Vec<String>,

    /// Print placemarks as a JSON array.
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Suppress the summary and info logs.
    #[arg(short, long)]
    quiet: bool,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let opts = CrawlOptions {
        source: cli.source,
        no_follow: cli.no_follow,
        max_links: cli.max_links,
        max_depth: cli.max_depth,
        timeout_ms: cli.timeout_ms,
        delay_ms: cli.delay_ms,
        fail_fast: cli.fail_fast,
        fields: cli.fields,
        json: cli.json,
        quiet: cli.quiet,
    };
    crawl_cmd::run(&opts).await
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        "kmlcrawl=debug"
    } else if cli.quiet {
        "kmlcrawl=warn"
    } else {
        "kmlcrawl=info"
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
