use std::io;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

/// Failure to retrieve a single page. Always recoverable except for the root listing.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("http {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("could not read body of {url}: {reason}")]
    Body { url: String, reason: String },

    #[error("link '{href}' cannot be resolved against {base}")]
    BadLink { base: String, href: String },
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("root listing {url} is unreachable: {source}")]
    RootListing {
        url: Url,
        #[source]
        source: FetchError,
    },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no sheet started before writing cells")]
    NoSheet,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid catalog URL '{input}': {source}")]
    Url {
        input: String,
        #[source]
        source: url::ParseError,
    },

    #[error("cannot read selector file {path}: {source}")]
    SelectorFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("selector file {path} is not valid JSON: {source}")]
    SelectorJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid CSS selector for '{field}': {selector}")]
    Selector { field: &'static str, selector: String },

    #[error("cannot build HTTP client: {0}")]
    Client(String),
}

/// Everything that can abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
