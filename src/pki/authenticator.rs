use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tracing::{debug, info, warn};
use x509_parser::prelude::*;

use crate::crypto::HashAlg;
use crate::crypto::ecdsa::{self, EcdsaSig};
use crate::vds::Vds;

use super::certificate::{RootCertificate, SigningCertificate, is_issued_by};
use super::errors::{VerifyError, VerifyResult};
use super::repository::CertificateRepository;
use super::revocation::RevocationList;

/// Base64url as found in `sig.cer` and `sig.sigvl`; issuers differ on padding
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Verifies VDS records against a country signing certificate.
///
/// The authenticator holds no state and may be shared freely between
/// threads. Every check either passes or fails with the [`VerifyError`]
/// naming the stage that rejected the record.
#[derive(Debug, Default, Clone, Copy)]
pub struct VdsAuthenticator;

impl VdsAuthenticator {
    pub fn new() -> Self {
        Self
    }

    /// Verify a record against a single pinned root certificate.
    ///
    /// `root_hash` is the hex encoded SHA-256 of `root_der` (any case).
    /// An empty `crls` slice means no revocations are known.
    pub fn verify<C: AsRef<[u8]>>(
        &self,
        vds: &Vds,
        root_der: &[u8],
        root_hash: &str,
        crls: &[C],
    ) -> VerifyResult<bool> {
        let signer_der = decode_signing_certificate(vds)?;
        let signer_cert = parse_signing_certificate(&signer_der)?;
        let signature = parse_signature(vds)?;
        let signer = SigningCertificate::load(&signer_der, &signer_cert)?;

        let crls: Vec<&[u8]> = crls.iter().map(AsRef::as_ref).collect();
        verify_against_root(vds, &signer, &signature, root_der, root_hash, &crls)
    }

    /// Verify a record against whichever trusted issuer signed it.
    ///
    /// The issuer found in `repository` takes the place of the pinned root:
    /// its fingerprint is pinned and its revocation list, if any, is checked.
    pub fn verify_with_repository<R>(&self, vds: &Vds, repository: &R) -> VerifyResult<bool>
    where
        R: CertificateRepository + ?Sized,
    {
        let signer_der = decode_signing_certificate(vds)?;
        let signer_cert = parse_signing_certificate(&signer_der)?;
        let signature = parse_signature(vds)?;
        let signer = SigningCertificate::load(&signer_der, &signer_cert)?;

        let issuer = repository
            .find_issuer(&signer_der)
            .map_err(|e| {
                warn!("Repository could not parse signing certificate: {e}");
                VerifyError::SigningCertificateParse
            })?
            .ok_or_else(|| {
                warn!("No trusted issuer for signing certificate");
                VerifyError::IssuerNotFound
            })?;

        let crls: Vec<&[u8]> = issuer.revocation_list().into_iter().collect();
        verify_against_root(
            vds,
            &signer,
            &signature,
            issuer.certificate(),
            issuer.fingerprint(),
            &crls,
        )
    }
}

fn decode_signing_certificate(vds: &Vds) -> VerifyResult<Vec<u8>> {
    BASE64_URL.decode(&vds.signature().cer).map_err(|e| {
        warn!("Signing certificate is not valid base64url: {e}");
        VerifyError::SigningCertificateParse
    })
}

fn parse_signing_certificate(der: &[u8]) -> VerifyResult<X509Certificate<'_>> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| {
        warn!("Signing certificate parsing failed: {e}");
        VerifyError::SigningCertificateParse
    })?;
    Ok(cert)
}

fn parse_signature(vds: &Vds) -> VerifyResult<EcdsaSig> {
    let raw = BASE64_URL.decode(&vds.signature().sigvl).map_err(|e| {
        warn!("Signature value is not valid base64url: {e}");
        VerifyError::SignatureParse
    })?;
    EcdsaSig::from_raw(vds.signature().alg.curve(), raw).map_err(|e| {
        warn!("Signature value rejected: {e}");
        VerifyError::SignatureParse
    })
}

fn verify_against_root(
    vds: &Vds,
    signer: &SigningCertificate<'_>,
    signature: &EcdsaSig,
    root_der: &[u8],
    root_hash: &str,
    crls: &[&[u8]],
) -> VerifyResult<bool> {
    let root = RootCertificate::load(root_der)?;

    let actual_hash = HashAlg::Sha256.hex_digest(root_der).map_err(|e| {
        warn!("Unable to hash root certificate: {e}");
        VerifyError::RootHashMismatch
    })?;
    if !actual_hash.eq_ignore_ascii_case(root_hash.trim()) {
        warn!("Root certificate hash {actual_hash} does not match pinned {root_hash}");
        return Err(VerifyError::RootHashMismatch);
    }
    debug!("Root certificate pinned");

    let revocation_lists = crls
        .iter()
        .map(|der| RevocationList::parse(der))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            warn!("CRL parsing failed: {e}");
            VerifyError::CrlLoad
        })?;

    if !revocation_lists
        .iter()
        .all(|crl| crl.is_signed_by(&root.key))
    {
        warn!("CRL is not signed by the root certificate");
        return Err(VerifyError::CrlVerification);
    }

    if revocation_lists
        .iter()
        .any(|crl| crl.is_revoked(&signer.serial))
    {
        warn!(
            "Signing certificate {} is revoked",
            hex::encode(&signer.serial)
        );
        return Err(VerifyError::CertificateRevoked);
    }
    debug!("Checked {} CRLs", revocation_lists.len());

    if signer.authority_key_id != root.subject_key_id {
        warn!(
            "AKI {} does not match root SKI {}",
            hex::encode(&signer.authority_key_id),
            hex::encode(&root.subject_key_id)
        );
        return Err(VerifyError::AuthorityKeyMismatch);
    }

    if !is_issued_by(signer.der, &root.key) {
        warn!("Signing certificate not issued by root");
        return Err(VerifyError::PathVerification);
    }
    debug!("Certificate path verified");

    let alg = vds.signature().alg;
    let valid = ecdsa::verify(
        &signer.public_key,
        vds.canonical_payload(),
        signature,
        alg.curve().hash_alg(),
    )
    .unwrap_or_else(|e| {
        warn!("Record signature could not be checked with {alg}: {e}");
        false
    });
    if !valid {
        warn!("Record signature does not match payload");
        return Err(VerifyError::SignatureVerification);
    }

    info!(uvci = %vds.data().msg.uvci, "VDS record verified");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64url_accepts_padded_and_unpadded() {
        assert_eq!(BASE64_URL.decode("_-8").unwrap(), vec![0xff, 0xef]);
        assert_eq!(BASE64_URL.decode("_-8=").unwrap(), vec![0xff, 0xef]);
        assert!(BASE64_URL.decode("/+8=").is_err());
    }
}
