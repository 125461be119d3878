//! Trust chain verification for VDS-NC records
//!
//! # Features
//! - Root certificate pinning by SHA-256 fingerprint
//! - CRL authenticity and revocation checks
//! - AKI/SKI linkage and cryptographic path verification
//! - ECDSA record signature verification over the signed payload
//! - Issuer discovery from a repository of trusted certificates

mod authenticator;
mod certificate;
mod errors;
mod repository;
mod revocation;

pub use authenticator::VdsAuthenticator;
pub use certificate::subject_country;
pub use errors::{CertificateParseError, VerifyError, VerifyResult};
pub use repository::{CertificateRepository, MemoryCertificateRepository, TrustedIssuer};
