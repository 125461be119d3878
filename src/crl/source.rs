use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use tracing::{debug, info, warn};
use url::Url;

use crate::vault::{Vault, VaultResult, crl_data_key, crl_fetched_at_key};

use super::errors::{CrlError, CrlResult};
use super::fetcher::CrlFetcher;

/// Collaborators a networked CRL source relies on
#[derive(Clone)]
pub struct CrlEnvironment {
    pub vault: Arc<dyn Vault>,
    pub fetcher: Arc<dyn CrlFetcher>,
}

impl CrlEnvironment {
    pub fn new(vault: Arc<dyn Vault>, fetcher: Arc<dyn CrlFetcher>) -> Self {
        Self { vault, fetcher }
    }
}

#[derive(Debug, Default, Clone)]
struct SourceState {
    data: Option<Vec<u8>>,
    last_fetched_at: Option<DateTime<Utc>>,
}

/// A single CRL, either fixed bytes or a distribution point that is
/// refreshed over the network and cached in the vault.
pub struct CrlSource {
    url: Option<Url>,
    env: Option<CrlEnvironment>,
    state: RwLock<SourceState>,
}

impl CrlSource {
    /// Create a source from a distribution point and/or initial bytes.
    ///
    /// When both are given the bytes are only a fallback: data already
    /// cached in the vault for `url` takes precedence.
    pub async fn new(
        url: Option<Url>,
        data: Option<Vec<u8>>,
        env: &CrlEnvironment,
    ) -> CrlResult<Self> {
        let Some(url) = url else {
            let data = data.ok_or(CrlError::InvalidSourceConfiguration)?;
            return Ok(Self::from_bytes(data));
        };

        let data_key = crl_data_key(url.as_str());
        let data = match env.vault.get(&data_key).await? {
            Some(cached) => {
                debug!("Using cached CRL for {url}");
                Some(cached)
            }
            None => data,
        };
        if let Some(bytes) = &data {
            env.vault.set(&data_key, bytes).await?;
        }

        let last_fetched_at = match env.vault.get(&crl_fetched_at_key(url.as_str())).await? {
            Some(raw) => parse_timestamp(&raw)
                .inspect_err(|e| warn!("Ignoring fetch time for {url}: {e}"))
                .ok(),
            None => None,
        };

        Ok(Self {
            url: Some(url),
            env: Some(env.clone()),
            state: RwLock::new(SourceState {
                data,
                last_fetched_at,
            }),
        })
    }

    /// Create a static source that never fetches.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            url: None,
            env: None,
            state: RwLock::new(SourceState {
                data: Some(data),
                last_fetched_at: None,
            }),
        }
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Current CRL bytes, if any are known
    pub fn data(&self) -> Option<Vec<u8>> {
        self.read_state().data.clone()
    }

    /// Time of the last successful network fetch
    pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.read_state().last_fetched_at
    }

    /// Whether this source needs refreshing.
    ///
    /// A networked source that was never fetched is overdue. Any source with
    /// a recorded fetch time is overdue once `threshold` has elapsed.
    pub fn is_overdue(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match self.last_fetched_at() {
            None => self.url.is_some(),
            Some(fetched_at) => {
                let threshold = TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX);
                now.signed_duration_since(fetched_at) > threshold
            }
        }
    }

    /// Download the distribution point and update the cached CRL.
    ///
    /// Returns `false` if the download failed, in which case nothing is
    /// changed. Static sources succeed without any I/O.
    pub async fn fetch(&self) -> bool {
        let (Some(url), Some(env)) = (&self.url, &self.env) else {
            return true;
        };

        let bytes = match env.fetcher.fetch(url).await {
            // the vault does not store empty values
            Ok(bytes) if bytes.is_empty() => {
                warn!("Empty CRL received from {url}");
                return false;
            }
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to fetch CRL from {url}: {e}");
                return false;
            }
        };
        let fetched_at = Utc::now();

        if let Err(e) = persist(env.vault.as_ref(), url, &bytes, fetched_at).await {
            warn!("Fetched CRL from {url} could not be cached: {e}");
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.data = Some(bytes);
        state.last_fetched_at = Some(fetched_at);
        info!("Updated CRL from {url}");

        true
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, SourceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("CrlSource")
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("data_len", &state.data.as_ref().map(Vec::len))
            .field("last_fetched_at", &state.last_fetched_at)
            .finish()
    }
}

async fn persist(
    vault: &dyn Vault,
    url: &Url,
    bytes: &[u8],
    fetched_at: DateTime<Utc>,
) -> VaultResult<()> {
    vault.set(&crl_data_key(url.as_str()), bytes).await?;
    let timestamp = fetched_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    vault
        .set(&crl_fetched_at_key(url.as_str()), timestamp.as_bytes())
        .await
}

fn parse_timestamp(raw: &[u8]) -> CrlResult<DateTime<Utc>> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| CrlError::InvalidTimestamp(String::from_utf8_lossy(raw).into_owned()))?;
    DateTime::parse_from_rfc3339(text.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| CrlError::InvalidTimestamp(text.to_string()))
}
