use std::sync::Arc;

use color_eyre::eyre::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::crl::{
    CrlEnvironment, CrlError, CrlManager, CrlSource, HttpCrlFetcher, TcpConnectivityProbe,
};
use crate::pki::{
    CertificateRepository, MemoryCertificateRepository, VdsAuthenticator, VerifyResult,
};
use crate::vault::{FileVault, Vault};
use crate::vds::{DecodeResult, Vds, VdsReader};

/// Application context tying decoding, verification and CRL upkeep
/// together.
///
/// Create one per application and share it; every field is cheap to clone
/// or stateless.
#[derive(Clone)]
pub struct VdsChecker {
    reader: VdsReader,
    authenticator: VdsAuthenticator,
    repository: Arc<dyn CertificateRepository>,
    crl_manager: CrlManager,
    environment: CrlEnvironment,
}

impl VdsChecker {
    pub fn new(
        crl_manager: CrlManager,
        environment: CrlEnvironment,
        repository: Arc<dyn CertificateRepository>,
    ) -> Self {
        Self {
            reader: VdsReader::new(),
            authenticator: VdsAuthenticator::new(),
            repository,
            crl_manager,
            environment,
        }
    }

    /// Build a checker from configuration.
    ///
    /// CRL sources listed in the configuration are loaded (seeded from the
    /// vault and any local files) but not fetched; call
    /// [`CrlManager::refresh_now`] or [`CrlManager::start_auto_refresh`]
    /// for that.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let vault: Arc<dyn Vault> = Arc::new(FileVault::new(&config.vault.path));
        let fetcher = HttpCrlFetcher::with_timeout(config.crl.request_timeout())
            .context("Failed to create CRL fetcher")?;
        let environment = CrlEnvironment::new(vault, Arc::new(fetcher));

        let probe = TcpConnectivityProbe::new(
            config.connectivity.probe_address.clone(),
            config.connectivity.timeout(),
        );
        let crl_manager = CrlManager::new(config.crl.settings(), Arc::new(probe));

        let mut sources = Vec::with_capacity(config.crl.sources.len());
        for entry in &config.crl.sources {
            let data = match &entry.file {
                Some(path) => Some(tokio::fs::read(path).await.map_err(|source| {
                    CrlError::File {
                        path: path.display().to_string(),
                        source,
                    }
                })?),
                None => None,
            };
            let source = CrlSource::new(entry.url.clone(), data, &environment)
                .await
                .with_context(|| format!("Invalid CRL source {entry:?}"))?;
            sources.push(source);
        }
        crl_manager.setup(sources);
        info!(
            "VDS checker ready with {} CRL sources",
            config.crl.sources.len()
        );

        Ok(Self::new(
            crl_manager,
            environment,
            Arc::new(MemoryCertificateRepository::new()),
        ))
    }

    pub fn decode(&self, bytes: impl AsRef<[u8]>) -> DecodeResult<Vds> {
        self.reader.decode(bytes)
    }

    /// Verify against a pinned root using the CRLs currently held by the
    /// CRL manager.
    pub fn verify(&self, vds: &Vds, root_der: &[u8], root_hash: &str) -> VerifyResult<bool> {
        let crls = self.crl_manager.current_crls();
        self.authenticator.verify(vds, root_der, root_hash, &crls)
    }

    /// Verify against whichever trusted issuer in the repository signed the
    /// record.
    pub fn verify_trusted(&self, vds: &Vds) -> VerifyResult<bool> {
        self.authenticator
            .verify_with_repository(vds, self.repository.as_ref())
    }

    pub fn authenticator(&self) -> VdsAuthenticator {
        self.authenticator
    }

    pub fn repository(&self) -> &Arc<dyn CertificateRepository> {
        &self.repository
    }

    pub fn crl_manager(&self) -> &CrlManager {
        &self.crl_manager
    }

    pub fn environment(&self) -> &CrlEnvironment {
        &self.environment
    }
}
