//! Remote data file retrieval.
//!
//! A data source that starts with `http://` or `https://` is fetched with a
//! single bounded GET; there are no retries.

pub mod config;
pub mod http;

pub use config::RemoteConfig;
pub use http::{fetch_text, HttpFetcher};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to fetch {url}: {reason}")]
    Transport { url: String, reason: String },
    #[error("HTTP {status} while fetching {url}")]
    Http { status: u16, url: String },
    #[error("failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Whether a data source designates a remote URL.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
