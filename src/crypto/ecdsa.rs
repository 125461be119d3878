use crate::crypto::HashAlg;
use crate::crypto::curves::Curve;
use crate::crypto::errors::{CryptoResult, Error};
use crate::crypto::keys::{PrivateKey, PublicKey};
use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig as OpenSslEcdsaSig;
use openssl::sign::{Signer, Verifier};
use std::fmt;

/// ECDSA signature representation
#[derive(Clone, PartialEq, Eq)]
pub struct EcdsaSig {
    // The curve used for this signature
    curve: Curve,
    // DER-encoded signature data
    der_data: Vec<u8>,
    // Raw signature components (r, s), left-padded to the coordinate size
    raw_components: (Vec<u8>, Vec<u8>),
}

impl EcdsaSig {
    /// Create signature from DER-encoded signature data
    pub fn from_der(curve: Curve, der_data: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let ecdsa_sig = OpenSslEcdsaSig::from_der(der_data.as_ref())?;
        let size = curve.coordinate_size() as i32;

        let r = ecdsa_sig.r().to_vec_padded(size)?;
        let s = ecdsa_sig.s().to_vec_padded(size)?;

        Ok(Self {
            curve,
            der_data: der_data.as_ref().to_vec(),
            raw_components: (r, s),
        })
    }

    /// Create signature from the raw `r || s` concatenation used by JWS/VDS
    ///
    /// The input must be exactly [`Curve::signature_size`] bytes long.
    pub fn from_raw(curve: Curve, raw: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let raw = raw.as_ref();
        if raw.len() != curve.signature_size() {
            return Err(Error::Invalid(format!(
                "Invalid signature length for {curve}: expected {} bytes, got {}",
                curve.signature_size(),
                raw.len()
            )));
        }
        let (r, s) = raw.split_at(curve.coordinate_size());
        Self::from_components(curve, r, s)
    }

    /// Create signature from raw r, s components
    pub fn from_components(curve: Curve, r: &[u8], s: &[u8]) -> CryptoResult<Self> {
        let r_bn = BigNum::from_slice(r)?;
        let s_bn = BigNum::from_slice(s)?;
        let ecdsa_sig = OpenSslEcdsaSig::from_private_components(r_bn, s_bn)?;
        let der_data = ecdsa_sig.to_der()?;

        Ok(Self {
            curve,
            der_data,
            raw_components: (r.to_vec(), s.to_vec()),
        })
    }

    /// Get the curve used for this signature
    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// Get DER-encoded signature data
    pub fn as_der(&self) -> &[u8] {
        &self.der_data
    }

    /// Get raw concatenated signature components r || s
    pub fn raw_signature(&self) -> Vec<u8> {
        let (r, s) = &self.raw_components;
        let mut combined = Vec::with_capacity(r.len() + s.len());
        combined.extend_from_slice(r);
        combined.extend_from_slice(s);
        combined
    }
}

impl fmt::Debug for EcdsaSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaSig")
            .field("curve", &self.curve)
            .field("size", &self.der_data.len())
            .field("hex", &hex::encode(&self.der_data))
            .finish()
    }
}

/// Sign data with a private key and return the signature
pub fn sign(
    private_key: &PrivateKey,
    data: impl AsRef<[u8]>,
    hash_alg: HashAlg,
) -> CryptoResult<EcdsaSig> {
    let mut signer = Signer::new(hash_alg.into(), private_key.as_openssl_pkey())?;
    signer.update(data.as_ref())?;
    let signature_der = signer.sign_to_vec()?;

    EcdsaSig::from_der(private_key.curve(), signature_der)
}

/// Verify a signature against data using a public key
pub fn verify(
    public_key: &PublicKey,
    data: impl AsRef<[u8]>,
    signature: &EcdsaSig,
    hash_alg: HashAlg,
) -> CryptoResult<bool> {
    if signature.curve() != public_key.curve() {
        return Err(Error::Invalid(
            "Signature curve does not match key curve".to_string(),
        ));
    }

    let mut verifier = Verifier::new(hash_alg.into(), public_key.as_openssl_pkey())?;
    verifier.update(data.as_ref())?;
    // openssl reports a malformed-but-parseable signature as an error stack
    Ok(verifier.verify(signature.as_der()).unwrap_or(false))
}
