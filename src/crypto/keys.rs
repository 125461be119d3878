use crate::crypto::curves::Curve;
use crate::crypto::errors::{CryptoResult, Error};
use openssl::bn::BigNumContext;
use openssl::ec::{EcGroup, EcKey, EcPoint, PointConversionForm as Form};
use openssl::pkey::{PKey, Private, Public};
use std::fmt;

/// Represents an EC private key
#[derive(Clone)]
pub struct PrivateKey {
    curve: Curve,
    openssl_key: PKey<Private>,
}

impl PrivateKey {
    /// Generate a new random private key with the given curve
    pub fn generate(curve: Curve) -> CryptoResult<Self> {
        let group: EcGroup = curve.try_into()?;
        let ec_key = EcKey::generate(&group)?;
        let pkey = PKey::from_ec_key(ec_key)?;

        Ok(Self {
            curve,
            openssl_key: pkey,
        })
    }

    /// Import key from PKCS#8 DER format
    pub fn from_pkcs8_der(der_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let pkey = PKey::private_key_from_der(der_bytes.as_ref())?;
        let curve: Curve = pkey.ec_key()?.group().try_into()?;

        Ok(Self {
            curve,
            openssl_key: pkey,
        })
    }

    /// Get the curve used by this key
    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// Get the OpenSSL PKey
    pub fn as_openssl_pkey(&self) -> &PKey<Private> {
        &self.openssl_key
    }

    /// Derive the corresponding public key
    pub fn public_key(&self) -> CryptoResult<PublicKey> {
        let ec_key = self.openssl_key.ec_key()?;
        let mut ctx = BigNumContext::new()?;
        let point_bytes = ec_key
            .public_key()
            .to_bytes(ec_key.group(), Form::UNCOMPRESSED, &mut ctx)?;

        PublicKey::from_bytes(self.curve, &point_bytes)
    }

    /// Export key in PKCS#8 DER format
    pub fn to_pkcs8_der(&self) -> CryptoResult<Vec<u8>> {
        Ok(self.openssl_key.private_key_to_pkcs8()?)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("curve", &self.curve)
            .field("key_data", &"[REDACTED]")
            .finish()
    }
}

/// Represents an EC public key
#[derive(Clone, Debug)]
pub struct PublicKey {
    curve: Curve,
    point_data: Vec<u8>,
    openssl_key: PKey<Public>,
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.curve == other.curve && self.point_data == other.point_data
    }
}

impl Eq for PublicKey {}

impl PublicKey {
    /// Create a public key from point bytes (uncompressed or compressed format)
    pub fn from_bytes(curve: Curve, point_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let bytes = point_bytes.as_ref();
        let len = bytes.len();
        if len != curve.uncompressed_point_size() && len != curve.coordinate_size() + 1 {
            return Err(Error::Invalid(format!(
                "Invalid point size: expected {} or {} bytes, got {len}",
                curve.uncompressed_point_size(),
                curve.coordinate_size() + 1
            )));
        }
        if !matches!(bytes[0], 0x02..=0x04) {
            return Err(Error::Invalid(
                "Point must be in correct uncompressed or compressed format".to_string(),
            ));
        }

        let group: EcGroup = curve.try_into()?;
        let mut ctx = BigNumContext::new()?;
        let point = EcPoint::from_bytes(&group, bytes, &mut ctx)?;
        let uncompressed = point.to_bytes(&group, Form::UNCOMPRESSED, &mut ctx)?;
        let ec_key = EcKey::from_public_key(&group, &point)?;
        ec_key.check_key()?;
        let pkey = PKey::from_ec_key(ec_key)?;

        Ok(Self {
            curve,
            point_data: uncompressed,
            openssl_key: pkey,
        })
    }

    /// Import key from SubjectPublicKeyInfo DER format
    ///
    /// Fails for non-EC keys and for curves outside [`Curve::all`].
    pub fn from_der(der_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let pkey = PKey::public_key_from_der(der_bytes.as_ref())?;
        let ec_key = pkey.ec_key()?;
        let group = ec_key.group();
        let curve: Curve = group.try_into()?;

        let mut ctx = BigNumContext::new()?;
        let point_bytes = ec_key
            .public_key()
            .to_bytes(group, Form::UNCOMPRESSED, &mut ctx)?;

        Ok(Self {
            curve,
            point_data: point_bytes,
            openssl_key: pkey,
        })
    }

    /// Get the curve used by this key
    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// Get the uncompressed point bytes
    pub fn uncompressed_bytes(&self) -> &[u8] {
        &self.point_data
    }

    /// Get the OpenSSL PKey of this public key
    pub fn as_openssl_pkey(&self) -> &PKey<Public> {
        &self.openssl_key
    }

    /// Export key in SubjectPublicKeyInfo DER format
    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        Ok(self.openssl_key.public_key_to_der()?)
    }
}
