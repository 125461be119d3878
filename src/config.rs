use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::crl::CrlSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crl: CrlConfig,
    pub vault: VaultConfig,
    pub connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrlConfig {
    pub refresh_interval_secs: u64,
    pub staleness_threshold_secs: u64,
    pub reconnect_poll_secs: u64,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub sources: Vec<CrlSourceConfig>,
}

impl CrlConfig {
    pub fn settings(&self) -> CrlSettings {
        CrlSettings {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            staleness_threshold: Duration::from_secs(self.staleness_threshold_secs),
            reconnect_poll: Duration::from_secs(self.reconnect_poll_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// A distribution point, a local DER file, or both (the file then only
/// seeds the cache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrlSourceConfig {
    #[serde(default)]
    pub url: Option<Url>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    pub probe_address: String,
    pub timeout_secs: u64,
}

impl ConnectivityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("crl.refresh_interval_secs", 86_400)?
            .set_default("crl.staleness_threshold_secs", 864_000)?
            .set_default("crl.reconnect_poll_secs", 600)?
            .set_default("crl.request_timeout_secs", 30)?
            .set_default("crl.sources", Vec::<String>::new())?
            .set_default("vault.path", ".secrets/vault.json")?
            .set_default("connectivity.probe_address", "1.1.1.1:443")?
            .set_default("connectivity.timeout_secs", 5)?
            .add_source(File::with_name("config/settings").required(false));

        // Explicit variables replace the process environment so tests
        // cannot leak settings into each other
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // e.g. VDS_CRL__REFRESH_INTERVAL_SECS or VDS_VAULT__PATH
            builder = builder.add_source(
                Environment::with_prefix("VDS")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::load_with_sources(Some(HashMap::new())).expect("Failed to load config");

        assert_eq!(config.crl.refresh_interval_secs, 86_400);
        assert_eq!(config.crl.staleness_threshold_secs, 864_000);
        assert_eq!(config.crl.reconnect_poll_secs, 600);
        assert_eq!(config.crl.request_timeout(), Duration::from_secs(30));
        assert!(config.crl.sources.is_empty());
        assert_eq!(config.vault.path, PathBuf::from(".secrets/vault.json"));
        assert_eq!(config.connectivity.probe_address, "1.1.1.1:443");
        assert_eq!(config.connectivity.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_settings_conversion() {
        let config = Config::load_with_sources(Some(HashMap::new())).expect("Failed to load config");
        assert_eq!(config.crl.settings(), CrlSettings::default());
    }

    #[test]
    fn test_partial_env_override() {
        let mut env_vars = HashMap::new();
        env_vars.insert("crl.refresh_interval_secs".to_string(), "3600".to_string());
        env_vars.insert("vault.path".to_string(), "/var/lib/vds/vault.json".to_string());

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.crl.refresh_interval_secs, 3600);
        assert_eq!(config.vault.path, PathBuf::from("/var/lib/vds/vault.json"));
        // The other values should use default
        assert_eq!(config.crl.reconnect_poll_secs, 600);
    }

    #[test]
    fn test_source_entries_deserialize() {
        let json = r#"[{"url":"https://pki.example.org/csca.crl"},{"file":"crl/local.crl"}]"#;
        let sources: Vec<CrlSourceConfig> = serde_json::from_str(json).unwrap();

        assert_eq!(
            sources[0].url.as_ref().map(Url::as_str),
            Some("https://pki.example.org/csca.crl")
        );
        assert_eq!(sources[0].file, None);
        assert_eq!(sources[1].file, Some(PathBuf::from("crl/local.crl")));
    }
}
