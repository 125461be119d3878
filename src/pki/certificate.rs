use openssl::pkey::{PKey, PKeyRef, Public};
use openssl::x509::X509;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;

use crate::crypto::PublicKey;

use super::errors::{VerifyError, VerifyResult};

/// Material taken from a business signing certificate
pub(crate) struct SigningCertificate<'a> {
    pub der: &'a [u8],
    pub public_key: PublicKey,
    pub serial: Vec<u8>,
    pub authority_key_id: Vec<u8>,
}

impl<'a> SigningCertificate<'a> {
    /// Extract the public key, serial number and AKI.
    pub fn load(der: &'a [u8], cert: &X509Certificate<'_>) -> VerifyResult<Self> {
        let public_key = PublicKey::from_der(cert.public_key().raw).map_err(|e| {
            tracing::warn!("Unusable signing certificate public key: {e}");
            VerifyError::SigningCertificateLoad
        })?;
        let authority_key_id = authority_key_identifier(cert).ok_or_else(|| {
            tracing::warn!("Signing certificate has no authority key identifier");
            VerifyError::SigningCertificateLoad
        })?;
        let serial = cert.tbs_certificate.serial.to_bytes_be();

        Ok(Self {
            der,
            public_key,
            serial,
            authority_key_id,
        })
    }
}

/// Material taken from a country signing (root) certificate
pub(crate) struct RootCertificate {
    pub key: PKey<Public>,
    pub subject_key_id: Vec<u8>,
}

impl RootCertificate {
    pub fn load(der: &[u8]) -> VerifyResult<Self> {
        let (_, cert) = X509Certificate::from_der(der).map_err(|e| {
            tracing::warn!("Root certificate parsing failed: {e}");
            VerifyError::RootCertificateLoad
        })?;
        let subject_key_id = subject_key_identifier(&cert).ok_or_else(|| {
            tracing::warn!("Root certificate has no subject key identifier");
            VerifyError::RootCertificateLoad
        })?;
        let key = issuer_key(&cert).map_err(|e| {
            tracing::warn!("Unusable root certificate public key: {e}");
            VerifyError::RootCertificateLoad
        })?;

        Ok(Self {
            key,
            subject_key_id,
        })
    }
}

/// Public key of an issuing certificate, ready for signature checks
pub(crate) fn issuer_key(
    cert: &X509Certificate<'_>,
) -> Result<PKey<Public>, openssl::error::ErrorStack> {
    PKey::public_key_from_der(cert.public_key().raw)
}

/// Check that the DER certificate `der` carries a valid signature by `key`.
///
/// Only the signature is checked. Works for every curve openssl knows,
/// P-521 with SHA-512 included.
pub(crate) fn is_issued_by(der: &[u8], key: &PKeyRef<Public>) -> bool {
    X509::from_der(der)
        .and_then(|cert| cert.verify(key))
        .inspect_err(|e| tracing::debug!("Certificate signature check failed: {e}"))
        .unwrap_or(false)
}

/// Key identifier of the Authority Key Identifier extension
pub(crate) fn authority_key_identifier(cert: &X509Certificate<'_>) -> Option<Vec<u8>> {
    cert.extensions()
        .iter()
        .find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::AuthorityKeyIdentifier(aki) => {
                aki.key_identifier.as_ref().map(|id| id.0.to_vec())
            }
            _ => None,
        })
}

/// Value of the Subject Key Identifier extension
pub(crate) fn subject_key_identifier(cert: &X509Certificate<'_>) -> Option<Vec<u8>> {
    cert.extensions()
        .iter()
        .find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(id) => Some(id.0.to_vec()),
            _ => None,
        })
}

/// Value of the first attribute of the subject's first RDN.
///
/// For country signing and document signing certificates this is the
/// country (`C=`) attribute.
pub fn subject_country(cert: &X509Certificate<'_>) -> Option<String> {
    cert.subject()
        .iter_rdn()
        .next()?
        .iter()
        .next()?
        .as_str()
        .ok()
        .map(str::to_owned)
}
