//! NetworkLink crawling: frontier, visited set, and request pacing.

pub mod manager;
pub mod rate_limiter;
