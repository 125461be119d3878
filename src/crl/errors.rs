use thiserror::Error;

use crate::vault::VaultError;

/// CRL-related errors
#[derive(Error, Debug)]
pub enum CrlError {
    #[error("A CRL source needs a URL, initial data, or both")]
    InvalidSourceConfiguration,

    #[error("No CRL sources have been configured")]
    NoSourcesConfigured,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error {status}: failed to fetch CRL from {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Empty CRL received from {url}")]
    EmptyResponse { url: String },

    #[error("Timeout while fetching CRL")]
    Timeout,

    #[error("Invalid CRL URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Stored fetch time is not a valid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Unable to read CRL file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenient Result type alias
pub type CrlResult<T> = Result<T, CrlError>;
