// src/errors.rs
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Failures of a single page fetch or parse step. One business's fetch
/// degrading never aborts the pool; one query failing never aborts link
/// collection.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("parse failure: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::NavigationTimeout(Duration::ZERO)
        } else {
            FetchError::Connection(err.to_string())
        }
    }
}

/// Synchronous rejections of `start_job`. Reported to the caller, never
/// retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartJobError {
    #[error("maximum of {limit} concurrent scraping sessions reached")]
    ConcurrencyLimitExceeded { limit: usize },

    #[error("this session is already scraping")]
    JobAlreadyActive,
}
