use std::slice;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};
use x509_parser::prelude::*;

use crate::crypto::HashAlg;

use super::certificate::{is_issued_by, issuer_key, subject_country};
use super::errors::CertificateParseError;

/// A trusted country signing certificate together with its revocation data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedIssuer {
    fingerprint: String,
    certificate: Vec<u8>,
    revocation_list: Option<Vec<u8>>,
    issuing_country: Option<String>,
}

impl TrustedIssuer {
    /// Create an issuer record from a known fingerprint.
    ///
    /// The issuing country is derived from the certificate subject when the
    /// certificate can be parsed; otherwise the record matches any country.
    pub fn new(
        fingerprint: impl Into<String>,
        certificate: impl Into<Vec<u8>>,
        revocation_list: Option<Vec<u8>>,
    ) -> Self {
        let certificate = certificate.into();
        let issuing_country = X509Certificate::from_der(&certificate)
            .ok()
            .and_then(|(_, cert)| subject_country(&cert));

        Self {
            fingerprint: fingerprint.into(),
            certificate,
            revocation_list,
            issuing_country,
        }
    }

    /// Create an issuer record, computing the SHA-256 fingerprint.
    pub fn from_der(
        certificate: impl Into<Vec<u8>>,
        revocation_list: Option<Vec<u8>>,
    ) -> Result<Self, CertificateParseError> {
        let certificate = certificate.into();
        let (_, cert) =
            X509Certificate::from_der(&certificate).map_err(|e| CertificateParseError::X509(e.into()))?;
        let issuing_country = subject_country(&cert);
        let fingerprint = HashAlg::Sha256.hex_digest(&certificate)?;

        Ok(Self {
            fingerprint,
            certificate,
            revocation_list,
            issuing_country,
        })
    }

    /// Override the derived issuing country
    pub fn with_issuing_country(mut self, issuing_country: Option<String>) -> Self {
        self.issuing_country = issuing_country;
        self
    }

    /// Hex encoded SHA-256 of the certificate
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// DER encoded certificate
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// DER encoded CRL published by this issuer, if known
    pub fn revocation_list(&self) -> Option<&[u8]> {
        self.revocation_list.as_deref()
    }

    pub fn issuing_country(&self) -> Option<&str> {
        self.issuing_country.as_deref()
    }

    fn serves_country(&self, country: Option<&str>) -> bool {
        match (self.issuing_country.as_deref(), country) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => true,
        }
    }
}

/// Abstract interface for a store of trusted issuers.
pub trait CertificateRepository: Send + Sync {
    /// Add issuers to the repository.
    fn add_issuers(&self, issuers: Vec<TrustedIssuer>);

    /// Remove every record equal to one of `issuers`.
    fn remove_issuers(&self, issuers: &[TrustedIssuer]);

    /// Find the trusted issuer whose key signed `certificate`.
    ///
    /// Candidates are narrowed to records for the certificate's subject
    /// country, then checked cryptographically. A certificate that cannot
    /// be parsed is an error, distinct from `Ok(None)`.
    fn find_issuer(&self, certificate: &[u8]) -> Result<Option<TrustedIssuer>, CertificateParseError>;

    fn add_issuer(&self, issuer: TrustedIssuer) {
        self.add_issuers(vec![issuer]);
    }

    fn remove_issuer(&self, issuer: &TrustedIssuer) {
        self.remove_issuers(slice::from_ref(issuer));
    }
}

/// In-memory repository.
///
/// Clones share the same underlying list. Lookup order is insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryCertificateRepository {
    issuers: Arc<RwLock<Vec<TrustedIssuer>>>,
}

impl MemoryCertificateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the amount of issuers currently held.
    pub fn len(&self) -> usize {
        self.issuers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all held issuers
    pub fn issuers(&self) -> Vec<TrustedIssuer> {
        self.issuers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.issuers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl CertificateRepository for MemoryCertificateRepository {
    fn add_issuers(&self, issuers: Vec<TrustedIssuer>) {
        let mut held = self.issuers.write().unwrap_or_else(PoisonError::into_inner);
        debug!("Adding {} trusted issuers", issuers.len());
        held.extend(issuers);
    }

    fn remove_issuers(&self, issuers: &[TrustedIssuer]) {
        let mut held = self.issuers.write().unwrap_or_else(PoisonError::into_inner);
        held.retain(|issuer| !issuers.contains(issuer));
    }

    fn find_issuer(&self, certificate: &[u8]) -> Result<Option<TrustedIssuer>, CertificateParseError> {
        let (_, candidate) =
            X509Certificate::from_der(certificate).map_err(|e| CertificateParseError::X509(e.into()))?;
        let country = subject_country(&candidate);

        let held = self.issuers.read().unwrap_or_else(PoisonError::into_inner);
        for issuer in held.iter().filter(|i| i.serves_country(country.as_deref())) {
            let Some(key) = X509Certificate::from_der(issuer.certificate())
                .ok()
                .and_then(|(_, ca)| issuer_key(&ca).ok())
            else {
                warn!(
                    "Skipping trusted issuer {} with unparsable certificate",
                    issuer.fingerprint()
                );
                continue;
            };
            if is_issued_by(certificate, &key) {
                debug!("Matched signing certificate to issuer {}", issuer.fingerprint());
                return Ok(Some(issuer.clone()));
            }
        }

        debug!(country = ?country, "No trusted issuer matched signing certificate");
        Ok(None)
    }
}
