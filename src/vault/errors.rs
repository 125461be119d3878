use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Vault-related errors
///
/// These describe problems with the storage environment, never with the
/// trustworthiness of a record.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Unable to access vault file {path}: {source}")]
    GetStoreFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Vault file is corrupt: {0}")]
    LoadKeystore(#[source] serde_json::Error),

    #[error("Unable to read vault entry {key}: {reason}")]
    GetEntry { key: String, reason: String },

    #[error("Unable to set vault entry {key}: {reason}")]
    SetEntry { key: String, reason: String },

    #[error("Unable to persist vault file: {0}")]
    StoreEntry(#[source] io::Error),

    #[error("Vault keys must not be blank")]
    InvalidKey,
}

/// Convenient Result type alias
pub type VaultResult<T> = Result<T, VaultError>;
