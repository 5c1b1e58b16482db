use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the engine. Nothing here is retried internally.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("could not connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("could not determine the page path of {url} (wiki.com/<page_path>/Page); try an article URL")]
    PageNameNotFound { url: String },

    #[error("web scraping is not supported for {host}")]
    UnsupportedPlatform { host: String },

    #[error("failed on page {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("wiki has no usable MediaWiki API")]
    ApiUnavailable,

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn fetch(url: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::FetchFailed {
            url: url.into(),
            reason: format!("{error:#}"),
        }
    }

    pub(crate) fn status(url: impl Into<String>, status: u16) -> Self {
        Self::FetchFailed {
            url: url.into(),
            reason: format!("HTTP {status}"),
        }
    }
}
