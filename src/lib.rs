//! Offline verification of ICAO VDS-NC vaccination records, with CRL
//! upkeep for the trust anchors they chain to.

pub mod config;
pub mod context;
pub mod crl;
pub mod crypto;
pub mod pki;
pub mod telemetry;
pub mod vault;
pub mod vds;

pub use context::VdsChecker;
