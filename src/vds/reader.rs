use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::debug;

use super::errors::{DecodeError, DecodeResult};
use super::model::{Vds, VdsData, VdsSignature};

/// Top-level shape of a VDS document with the signed member left unparsed
#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(borrow)]
    data: &'a RawValue,
    sig: VdsSignature,
}

/// Decodes VDS-NC JSON documents
#[derive(Debug, Default, Clone, Copy)]
pub struct VdsReader;

impl VdsReader {
    pub fn new() -> Self {
        Self
    }

    /// Decode a VDS record from its JSON bytes.
    ///
    /// The raw text of the `data` member is retained verbatim as the
    /// record's canonical payload. Any structural mismatch with the
    /// schema is reported as [`DecodeError::MalformedRecord`].
    pub fn decode(&self, json: impl AsRef<[u8]>) -> DecodeResult<Vds> {
        let envelope: Envelope<'_> =
            serde_json::from_slice(json.as_ref()).map_err(DecodeError::MalformedRecord)?;
        let raw_data = envelope.data.get();
        let data: VdsData =
            serde_json::from_str(raw_data).map_err(DecodeError::MalformedRecord)?;

        debug!(
            uvci = %data.msg.uvci,
            payload_len = raw_data.len(),
            "Decoded VDS record"
        );
        Ok(Vds::new(data, envelope.sig, raw_data.as_bytes().to_vec()))
    }

    /// Decode a VDS record from a JSON string
    pub fn decode_str(&self, json: &str) -> DecodeResult<Vds> {
        self.decode(json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vds::SignatureAlgorithm;

    const VALID_VDS: &str = r#"
{
    "data": {
        "hdr": {
            "is": "AUS",
            "t": "icao.vacc",
            "v": 1
        },
        "msg": {
            "pid": {
                "dob": "2004-03-20",
                "i": "PA0940385",
                "n": "CITIZEN  JOHN",
                "sex": "M"
            },
            "uvci": "VB0009990025",
            "ve": [{
                "des": "XM68M6",
                "dis": "RA01.0",
                "nam": "AstraZeneca Vaxzevria",
                "vd": [{
                    "adm": "Community Nurse",
                    "ctr": "AUS",
                    "dvc": "2021-04-02",
                    "lot": "317711P",
                    "seq": 1
                }]
            }]
        }
    },
    "sig": {
        "alg": "ES256",
        "cer": "MIIB",
        "sigvl": "70r84nJGP4hnkx3fZkHfhRG2AaGrC1wKgkzbLWkBZpiQ0DJUQ_x9WJGTqMAAjWGfUDcoAtsmKlg_HrDhNChjKg=="
    }
}
"#;

    #[test]
    fn test_decode_valid_record() {
        let vds = VdsReader::new().decode_str(VALID_VDS).unwrap();

        assert_eq!(vds.data().hdr.issuing_country, "AUS");
        assert_eq!(vds.data().hdr.t, "icao.vacc");
        assert_eq!(vds.data().msg.uvci, "VB0009990025");
        assert_eq!(vds.data().msg.pid.n, "CITIZEN  JOHN");
        assert_eq!(vds.data().msg.pid.ai, None);
        assert_eq!(vds.data().msg.ve[0].vd[0].seq, 1);
        assert_eq!(vds.data().msg.ve[0].vd[0].dvn, None);
        assert_eq!(vds.signature().alg, SignatureAlgorithm::Es256);
    }

    #[test]
    fn test_canonical_payload_is_verbatim() {
        let vds = VdsReader::new().decode_str(VALID_VDS).unwrap();
        let payload = std::str::from_utf8(vds.canonical_payload()).unwrap();

        let start = VALID_VDS.find("{\n        \"hdr\"").unwrap();
        let end = VALID_VDS.find(",\n    \"sig\"").unwrap();
        assert_eq!(payload, &VALID_VDS[start..end]);
    }

    #[test]
    fn test_canonical_payload_keeps_escapes_and_order() {
        let json = r#"{"sig":{"alg":"ES384","cer":"AA","sigvl":"AA"},"data":{"msg":{"uvci":"XA","pid":{"n":"A\/B"},"ve":[]},"hdr":{"v":1,"t":"icao.test","is":"NZL"}}}"#;
        let vds = VdsReader::new().decode_str(json).unwrap();

        assert_eq!(
            vds.canonical_payload(),
            br#"{"msg":{"uvci":"XA","pid":{"n":"A\/B"},"ve":[]},"hdr":{"v":1,"t":"icao.test","is":"NZL"}}"#
        );
        assert_eq!(vds.data().msg.uvci, "XA");
        assert_eq!(vds.data().msg.pid.n, "A/B");
    }

    #[test]
    fn test_non_vds_json() {
        let result = VdsReader::new().decode_str(r#"{ "isThisAVDS": false }"#);
        assert!(matches!(result, Err(DecodeError::MalformedRecord(_))));
    }

    #[test]
    fn test_not_json() {
        let result = VdsReader::new().decode(b"\xff\xfe not json");
        assert!(matches!(result, Err(DecodeError::MalformedRecord(_))));
    }

    #[test]
    fn test_missing_required_field() {
        let json = VALID_VDS.replace("\"uvci\": \"VB0009990025\",", "");
        let result = VdsReader::new().decode_str(&json);
        assert!(matches!(result, Err(DecodeError::MalformedRecord(_))));
    }

    #[test]
    fn test_type_mismatch() {
        let json = VALID_VDS.replace("\"seq\": 1", "\"seq\": \"one\"");
        let result = VdsReader::new().decode_str(&json);
        assert!(matches!(result, Err(DecodeError::MalformedRecord(_))));
    }

    #[test]
    fn test_unknown_algorithm() {
        let json = VALID_VDS.replace("\"ES256\"", "\"RS256\"");
        let result = VdsReader::new().decode_str(&json);
        assert!(matches!(result, Err(DecodeError::MalformedRecord(_))));
    }
}
