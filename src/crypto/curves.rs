use crate::crypto::HashAlg;
use crate::crypto::errors::{CryptoResult, Error};
use openssl::ec::{EcGroup, EcGroupRef};
use openssl::nid::Nid;
use std::fmt;

/// Elliptic curves admitted for VDS-NC signing certificates
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq)]
pub enum Curve {
    /// NIST P-256 (secp256r1)
    #[default]
    NistP256,
    /// NIST P-384 (secp384r1)
    NistP384,
    /// NIST P-521 (secp521r1)
    NistP521,
}

impl Curve {
    /// Get the OpenSSL NID for this curve
    pub fn to_nid(self) -> Nid {
        match self {
            Curve::NistP256 => Nid::X9_62_PRIME256V1,
            Curve::NistP384 => Nid::SECP384R1,
            Curve::NistP521 => Nid::SECP521R1,
        }
    }

    /// Resolve a curve from its OpenSSL NID
    pub fn from_nid(nid: Nid) -> CryptoResult<Self> {
        match nid {
            Nid::X9_62_PRIME256V1 => Ok(Curve::NistP256),
            Nid::SECP384R1 => Ok(Curve::NistP384),
            Nid::SECP521R1 => Ok(Curve::NistP521),
            other => Err(Error::UnsupportedCurve(format!("{other:?}"))),
        }
    }

    /// Create an OpenSSL EcGroup for this curve
    pub fn to_ec_group(self) -> CryptoResult<EcGroup> {
        Ok(EcGroup::from_curve_name(self.to_nid())?)
    }

    /// Get the coordinate size in bytes
    pub fn coordinate_size(self) -> usize {
        match self {
            Curve::NistP256 => 32,
            Curve::NistP384 => 48,
            Curve::NistP521 => 66,
        }
    }

    /// Get the uncompressed point size in bytes
    pub fn uncompressed_point_size(self) -> usize {
        1 + 2 * self.coordinate_size()
    }

    /// Size of a raw `r || s` signature in bytes
    pub fn signature_size(self) -> usize {
        2 * self.coordinate_size()
    }

    /// Digest paired with this curve in the JOSE `ES*` suites
    pub fn hash_alg(self) -> HashAlg {
        match self {
            Curve::NistP256 => HashAlg::Sha256,
            Curve::NistP384 => HashAlg::Sha384,
            Curve::NistP521 => HashAlg::Sha512,
        }
    }

    /// Get all supported curves
    pub fn all() -> &'static [Curve] {
        &[Curve::NistP256, Curve::NistP384, Curve::NistP521]
    }
}

impl TryFrom<Curve> for EcGroup {
    type Error = Error;

    fn try_from(curve: Curve) -> Result<Self, Self::Error> {
        curve.to_ec_group()
    }
}

impl TryFrom<&EcGroupRef> for Curve {
    type Error = Error;

    fn try_from(group: &EcGroupRef) -> Result<Self, Self::Error> {
        let nid = group
            .curve_name()
            .ok_or_else(|| Error::UnsupportedCurve("explicit curve parameters".to_string()))?;
        Curve::from_nid(nid)
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Curve::NistP256 => "NIST P-256 (secp256r1)",
            Curve::NistP384 => "NIST P-384 (secp384r1)",
            Curve::NistP521 => "NIST P-521 (secp521r1)",
        };
        write!(f, "{name}")
    }
}
