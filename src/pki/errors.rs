use thiserror::Error;
use x509_parser::prelude::X509Error;

/// Reasons a VDS record fails verification.
///
/// Each variant names the pipeline stage that rejected the record. None of
/// them are transient: retrying with the same inputs gives the same answer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Signing certificate could not be parsed")]
    SigningCertificateParse,

    #[error("Signature value could not be parsed")]
    SignatureParse,

    #[error("Signing certificate is missing required material")]
    SigningCertificateLoad,

    #[error("Root certificate is missing required material")]
    RootCertificateLoad,

    #[error("Root certificate does not match the pinned hash")]
    RootHashMismatch,

    #[error("Certificate revocation list could not be parsed")]
    CrlLoad,

    #[error("Certificate revocation list is not signed by the root certificate")]
    CrlVerification,

    #[error("Signing certificate has been revoked")]
    CertificateRevoked,

    #[error("Signing certificate authority key identifier does not match the root")]
    AuthorityKeyMismatch,

    #[error("Signing certificate is not signed by the root certificate")]
    PathVerification,

    #[error("Record signature verification failed")]
    SignatureVerification,

    #[error("No trusted issuer found for the signing certificate")]
    IssuerNotFound,

    #[error("Unique certificate identifier could not be parsed")]
    IdentifierParse,
}

/// Convenient Result type alias
pub type VerifyResult<T> = Result<T, VerifyError>;

/// A certificate handed to the repository could not be processed
#[derive(Error, Debug)]
pub enum CertificateParseError {
    #[error("X.509 error: {0}")]
    X509(#[from] X509Error),

    #[error("Fingerprint computation failed: {0}")]
    Fingerprint(#[from] crate::crypto::Error),
}
