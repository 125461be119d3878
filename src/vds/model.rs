use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Curve;
use crate::pki::VerifyResult;

use super::uvci::{UvciChecker, UvciRange};

/// A decoded VDS-NC record.
///
/// Instances only come out of [`VdsReader::decode`](super::VdsReader::decode)
/// and cannot be mutated afterwards: the signed payload bytes captured at
/// decode time are what the signature is checked against.
#[derive(Debug, Clone, PartialEq)]
pub struct Vds {
    data: VdsData,
    sig: VdsSignature,
    canonical_payload: Vec<u8>,
}

impl Vds {
    pub(crate) fn new(data: VdsData, sig: VdsSignature, canonical_payload: Vec<u8>) -> Self {
        Self {
            data,
            sig,
            canonical_payload,
        }
    }

    /// Header and message
    pub fn data(&self) -> &VdsData {
        &self.data
    }

    /// Signature block
    pub fn signature(&self) -> &VdsSignature {
        &self.sig
    }

    /// The exact bytes of the `data` member as they appeared in the input
    pub fn canonical_payload(&self) -> &[u8] {
        &self.canonical_payload
    }

    /// Classify this record's UVCI
    pub fn uvci_range(&self) -> VerifyResult<UvciRange> {
        UvciChecker::check_range(&self.data.msg.uvci)
    }
}

/// Signed portion of the record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdsData {
    pub hdr: VdsHeader,
    pub msg: VdsMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdsHeader {
    /// Version
    pub v: i64,
    /// Type of data, `icao.vacc` or `icao.test`
    pub t: String,
    /// Issuing country as an ISO 3166 alpha-3 code
    #[serde(rename = "is")]
    pub issuing_country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdsMessage {
    /// Unique vaccination certificate identifier
    pub uvci: String,
    pub pid: VdsPerson,
    pub ve: Vec<VdsVaccinationEvent>,
}

/// Person identification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdsPerson {
    /// Name; a double space separates primary and secondary identifiers
    pub n: String,
    /// Date of birth, `yyyy-MM-dd`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    /// `M`, `F` or `X`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    /// Travel document number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i: Option<String>,
    /// Additional identifier at the discretion of the issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdsVaccinationEvent {
    /// Vaccine type/subtype
    pub des: String,
    /// Brand name
    pub nam: String,
    /// Disease targeted
    pub dis: String,
    pub vd: Vec<VdsVaccinationDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdsVaccinationDetail {
    /// Date of vaccination
    pub dvc: String,
    /// Dose sequence number
    pub seq: i64,
    /// Country of vaccination
    pub ctr: String,
    /// Administering centre
    pub adm: String,
    /// Lot number
    pub lot: String,
    /// Date of next dose
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dvn: Option<String>,
}

/// Signature block: algorithm, signing certificate and signature value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdsSignature {
    pub alg: SignatureAlgorithm,
    /// Base64url encoded DER signing certificate
    pub cer: String,
    /// Base64url encoded raw `r || s` signature
    pub sigvl: String,
}

/// Signature suites permitted for VDS-NC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[serde(rename = "ES256")]
    Es256,
    #[serde(rename = "ES384")]
    Es384,
    #[serde(rename = "ES512")]
    Es512,
}

impl SignatureAlgorithm {
    /// Curve the signing key must be on
    pub fn curve(self) -> Curve {
        match self {
            SignatureAlgorithm::Es256 => Curve::NistP256,
            SignatureAlgorithm::Es384 => Curve::NistP384,
            SignatureAlgorithm::Es512 => Curve::NistP521,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignatureAlgorithm::Es256 => "ES256",
            SignatureAlgorithm::Es384 => "ES384",
            SignatureAlgorithm::Es512 => "ES512",
        };
        write!(f, "{name}")
    }
}
