use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Vault, VaultEntry, VaultResult, check_key};

/// An in-memory vault.
///
/// Useful for testing and for deployments that do not need the CRL cache
/// to survive a restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryVault {
    entries: Arc<DashMap<String, VaultEntry>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn get_entry(&self, key: &str) -> VaultResult<Option<VaultEntry>> {
        check_key(key)?;
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set_entry(&self, key: &str, entry: VaultEntry) -> VaultResult<()> {
        check_key(key)?;
        if !entry.is_empty() {
            self.entries.insert(key.to_string(), entry);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> VaultResult<()> {
        check_key(key)?;
        self.entries.remove(key);
        Ok(())
    }
}
