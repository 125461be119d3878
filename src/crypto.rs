mod curves;
pub mod ecdsa;
mod errors;
mod keys;

pub use curves::Curve;
pub use errors::{CryptoResult, Error};
pub use keys::{PrivateKey, PublicKey};

use openssl::hash::{Hasher, MessageDigest as Digest};
use std::fmt;

/// Hash algorithms used by the VDS signature suites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlg {
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl HashAlg {
    /// Hash the given data with this hash algorithm
    pub fn hash(&self, data: impl AsRef<[u8]>) -> CryptoResult<Vec<u8>> {
        let mut hasher = Hasher::new(self.into())?;
        hasher.update(data.as_ref())?;
        Ok(hasher.finish()?.to_vec())
    }

    /// Hash the given data and return the lowercase hex digest
    pub fn hex_digest(&self, data: impl AsRef<[u8]>) -> CryptoResult<String> {
        Ok(hex::encode(self.hash(data)?))
    }

    /// Get the output size in bytes
    pub fn output_size(self) -> usize {
        match self {
            HashAlg::Sha256 => 32,
            HashAlg::Sha384 => 48,
            HashAlg::Sha512 => 64,
        }
    }
}

impl From<&HashAlg> for Digest {
    fn from(hash_alg: &HashAlg) -> Self {
        match hash_alg {
            HashAlg::Sha256 => Digest::sha256(),
            HashAlg::Sha384 => Digest::sha384(),
            HashAlg::Sha512 => Digest::sha512(),
        }
    }
}

impl From<HashAlg> for Digest {
    fn from(hash_alg: HashAlg) -> Self {
        (&hash_alg).into()
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlg::Sha256 => "SHA-256",
            HashAlg::Sha384 => "SHA-384",
            HashAlg::Sha512 => "SHA-512",
        };
        write!(f, "{name}")
    }
}
