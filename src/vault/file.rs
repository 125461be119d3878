use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Vault, VaultEntry, VaultError, VaultResult, check_key};

type Document = BTreeMap<String, Value>;

/// A vault persisted as a JSON document on disk.
///
/// The file is read on first access and rewritten atomically after every
/// change. Entries are decoded individually, so one damaged entry does not
/// make the rest of the vault unreadable.
#[derive(Debug)]
pub struct FileVault {
    path: PathBuf,
    document: Mutex<Option<Document>>,
}

impl FileVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the backing file and forget every entry.
    pub async fn destroy(&self) -> VaultResult<()> {
        let mut document = self.document.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => info!("Destroyed vault at {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(VaultError::GetStoreFile {
                    path: self.path.clone(),
                    source,
                });
            }
        }
        *document = Some(Document::new());
        Ok(())
    }

    async fn load(&self) -> VaultResult<Document> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No vault at {}, starting empty", self.path.display());
                return Ok(Document::new());
            }
            Err(source) => {
                return Err(VaultError::GetStoreFile {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let document = serde_json::from_slice(&bytes).map_err(VaultError::LoadKeystore)?;
        debug!("Loaded vault from {}", self.path.display());
        Ok(document)
    }

    async fn store(&self, document: &Document) -> VaultResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| VaultError::GetStoreFile {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let contents = serde_json::to_vec_pretty(document)
            .map_err(|e| VaultError::StoreEntry(io::Error::other(e)))?;

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        fs::write(&tmp_path, contents)
            .await
            .map_err(VaultError::StoreEntry)?;
        restrict_permissions(&tmp_path).await?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(VaultError::StoreEntry)
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> VaultResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(VaultError::StoreEntry)
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> VaultResult<()> {
    Ok(())
}

#[async_trait]
impl Vault for FileVault {
    async fn get_entry(&self, key: &str) -> VaultResult<Option<VaultEntry>> {
        check_key(key)?;
        let mut guard = self.document.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        let Some(value) = guard.as_ref().and_then(|document| document.get(key)) else {
            return Ok(None);
        };

        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| VaultError::GetEntry {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn set_entry(&self, key: &str, entry: VaultEntry) -> VaultResult<()> {
        check_key(key)?;
        if entry.is_empty() {
            return Ok(());
        }
        let value = serde_json::to_value(&entry).map_err(|e| VaultError::SetEntry {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let mut guard = self.document.lock().await;
        let mut document = match guard.take() {
            Some(document) => document,
            None => self.load().await?,
        };
        let previous = document.insert(key.to_string(), value);

        let stored = self.store(&document).await;
        if stored.is_err() {
            restore(&mut document, key, previous);
        }
        *guard = Some(document);
        stored
    }

    async fn remove(&self, key: &str) -> VaultResult<()> {
        check_key(key)?;
        let mut guard = self.document.lock().await;
        let mut document = match guard.take() {
            Some(document) => document,
            None => self.load().await?,
        };

        let stored = match document.remove(key) {
            Some(previous) => {
                let stored = self.store(&document).await;
                if stored.is_err() {
                    restore(&mut document, key, Some(previous));
                }
                stored
            }
            None => Ok(()),
        };
        *guard = Some(document);
        stored
    }
}

/// Put back the value `key` had before a change that could not be stored
fn restore(document: &mut Document, key: &str, previous: Option<Value>) {
    match previous {
        Some(value) => document.insert(key.to_string(), value),
        None => document.remove(key),
    };
}
