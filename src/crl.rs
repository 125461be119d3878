//! CRL lifecycle management
//!
//! # Features
//! - Static and networked CRL sources, cached in a [`Vault`](crate::vault::Vault)
//! - Sequential refresh of every source with completion notification
//! - Periodic automatic refresh
//! - Connectivity polling after a failed refresh

mod connectivity;
mod errors;
mod fetcher;
mod manager;
mod source;

pub use connectivity::{ConnectivityProbe, TcpConnectivityProbe};
pub use errors::{CrlError, CrlResult};
pub use fetcher::{CrlFetcher, HttpCrlFetcher};
pub use manager::{CrlManager, CrlSettings, CrlUpdated, OnComplete, RefreshOutcome, RefreshState};
pub use source::{CrlEnvironment, CrlSource};
