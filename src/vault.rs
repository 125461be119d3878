//! Persistent key-value storage for cached CRL material
//!
//! Entries are tagged as either opaque secrets or certificates. The CRL
//! subsystem only ever stores opaque bytes, under the keys built by
//! [`crl_data_key`] and [`crl_fetched_at_key`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod errors;
mod file;
mod memory;

pub use errors::{VaultError, VaultResult};
pub use file::FileVault;
pub use memory::MemoryVault;

/// A single stored value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum VaultEntry {
    /// Opaque bytes
    Secret(#[serde(with = "base64_bytes")] Vec<u8>),
    /// DER encoded X.509 certificate
    Certificate(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl VaultEntry {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            VaultEntry::Secret(bytes) | VaultEntry::Certificate(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            VaultEntry::Secret(bytes) | VaultEntry::Certificate(bytes) => bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Abstract interface for secure storage backends.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Loads the entry stored under `key`, if any.
    async fn get_entry(&self, key: &str) -> VaultResult<Option<VaultEntry>>;

    /// Stores `entry` under `key`, replacing any previous entry.
    ///
    /// Storing an empty entry leaves the vault unchanged.
    async fn set_entry(&self, key: &str, entry: VaultEntry) -> VaultResult<()>;

    /// Deletes the entry stored under `key`.
    async fn remove(&self, key: &str) -> VaultResult<()>;

    /// Loads the raw bytes stored under `key`, whatever the entry kind.
    async fn get(&self, key: &str) -> VaultResult<Option<Vec<u8>>> {
        Ok(self.get_entry(key).await?.map(VaultEntry::into_bytes))
    }

    /// Stores `value` as an opaque secret.
    async fn set(&self, key: &str, value: &[u8]) -> VaultResult<()> {
        self.set_entry(key, VaultEntry::Secret(value.to_vec())).await
    }
}

/// Key of the cached CRL bytes for a distribution point
pub fn crl_data_key(url: &str) -> String {
    format!("crl.data.{url}")
}

/// Key of the last successful fetch time for a distribution point
pub fn crl_fetched_at_key(url: &str) -> String {
    format!("crl.fetchedAt.{url}")
}

pub(crate) fn check_key(key: &str) -> VaultResult<()> {
    if key.trim().is_empty() {
        return Err(VaultError::InvalidKey);
    }
    Ok(())
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
