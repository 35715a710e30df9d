//! Error types for the store, the ranking fetch and the Yo API.

use thiserror::Error;

/// Errors raised by a key-value store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// The key holds a value of another type (e.g. a hash where a set is expected)
    #[error("key '{key}' holds a {found}, expected a {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors that abort a ranking fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("ranking request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("ranking API returned status {status} instead of 200 for {url}")]
    Status { url: String, status: u16 },

    #[error("ranking API response from {url} could not be parsed: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("ranking API page {url} has no entries")]
    EmptyPage { url: String },

    #[error("ranking API page {url} has no next page cursor ({collected} links collected so far)")]
    MissingCursor { url: String, collected: usize },
}

/// Errors returned by the Yo push API client
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Yo API token is invalid: expected {expected} characters, got {actual}")]
    InvalidToken { expected: usize, actual: usize },

    #[error("Yo request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Yo API returned status {status} instead of 200, body: {body}")]
    Status { status: u16, body: String },

    #[error("Yo API response did not report success, body: {body}")]
    Unsuccessful { body: String },
}

/// Errors that abort a refresh cycle
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("fetching hot links failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("{step} of the candidate set failed: {source}")]
    Install {
        step: &'static str,
        #[source]
        source: StoreError,
    },
}
