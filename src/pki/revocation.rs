use openssl::pkey::{PKeyRef, Public};
use openssl::x509::X509Crl;
use x509_parser::prelude::*;

/// A parsed certificate revocation list
pub(crate) struct RevocationList<'a> {
    der: &'a [u8],
    crl: CertificateRevocationList<'a>,
}

impl<'a> RevocationList<'a> {
    /// Parse a DER encoded CRL
    pub fn parse(der: &'a [u8]) -> Result<Self, X509Error> {
        let (_, crl) = CertificateRevocationList::from_der(der)?;
        Ok(Self { der, crl })
    }

    /// Check that this CRL was signed by the holder of `issuer_key`
    pub fn is_signed_by(&self, issuer_key: &PKeyRef<Public>) -> bool {
        X509Crl::from_der(self.der)
            .and_then(|crl| crl.verify(issuer_key))
            .inspect_err(|e| tracing::debug!("CRL signature verification failed: {e}"))
            .unwrap_or(false)
    }

    /// Serial numbers of every revoked certificate, big-endian
    pub fn revoked_serials(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.crl
            .tbs_cert_list
            .revoked_certificates
            .iter()
            .map(|revoked| revoked.user_certificate.to_bytes_be())
    }

    /// Whether the given serial number is listed
    pub fn is_revoked(&self, serial: &[u8]) -> bool {
        self.revoked_serials().any(|revoked| revoked == serial)
    }
}
