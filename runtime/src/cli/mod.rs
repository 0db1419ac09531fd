//! CLI command implementations for the kmlcrawl binary.

pub mod crawl_cmd;
pub mod output;
