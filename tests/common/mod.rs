#![allow(dead_code)]

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use openssl::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints as X509BasicConstraints, CrlNumber, KeyUsage,
    SubjectKeyIdentifier,
};
use openssl::x509::{
    X509, X509Builder, X509CrlBuilder, X509Extension, X509Name, X509RevokedBuilder,
};
use rcgen::{
    BasicConstraints, CertificateParams, CertificateRevocationListParams, DistinguishedName,
    DnType, IsCa, Issuer, KeyIdMethod, KeyPair, KeyUsagePurpose, RevocationReason,
    RevokedCertParams, SerialNumber,
};
use time::{Duration, OffsetDateTime};
use url::Url;
use vds_checker::crl::{ConnectivityProbe, CrlFetcher, CrlResult};
use vds_checker::crypto::{Curve, HashAlg, PrivateKey, ecdsa};
use vds_checker::vds::{Vds, VdsReader};

pub use rcgen::{PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384};

pub const SIGNER_SERIAL: [u8; 2] = [0x18, 0xAD];
pub const PERSON_NAME: &str = "CITIZEN  JANE SUE";

// Doubles for the network collaborators
mockall::mock! {
    pub Fetcher {}

    #[async_trait::async_trait]
    impl CrlFetcher for Fetcher {
        async fn fetch(&self, url: &Url) -> CrlResult<Vec<u8>>;
    }
}

mockall::mock! {
    pub Probe {}

    #[async_trait::async_trait]
    impl ConnectivityProbe for Probe {
        async fn is_connected(&self) -> bool;
    }
}

/// A country signing CA and the DER of its self-signed certificate
pub struct RootCa {
    pub issuer: Issuer<'static, KeyPair>,
    pub der: Vec<u8>,
}

impl RootCa {
    pub fn hash(&self) -> String {
        HashAlg::Sha256.hex_digest(&self.der).unwrap()
    }

    /// Subject key identifier as written into the certificate
    pub fn key_id(&self) -> Vec<u8> {
        use x509_parser::extensions::ParsedExtension;
        use x509_parser::prelude::*;

        let (_, cert) = X509Certificate::from_der(&self.der).unwrap();
        cert.extensions()
            .iter()
            .find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(id) => Some(id.0.to_vec()),
                _ => None,
            })
            .unwrap()
    }
}

/// A document signing certificate and its private key
pub struct Signer {
    pub der: Vec<u8>,
    pub key: PrivateKey,
}

fn root_params(country: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, country);
    dn.push(DnType::OrganizationName, "Test Health Authority");
    dn.push(DnType::CommonName, format!("{country} CSCA"));
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params
}

pub fn root_ca(country: &str) -> RootCa {
    root_ca_with(country, &PKCS_ECDSA_P256_SHA256, None)
}

/// Root CA with a chosen key type and, optionally, a forged key identifier
pub fn root_ca_with(
    country: &str,
    alg: &'static rcgen::SignatureAlgorithm,
    key_id: Option<Vec<u8>>,
) -> RootCa {
    let key = KeyPair::generate_for(alg).unwrap();
    let mut params = root_params(country);
    if let Some(key_id) = key_id {
        params.key_identifier_method = KeyIdMethod::PreSpecified(key_id);
    }
    let der = params.self_signed(&key).unwrap().der().to_vec();
    RootCa {
        issuer: Issuer::new(params, key),
        der,
    }
}

pub fn signer(root: &RootCa, country: &str) -> Signer {
    signer_with(root, country, &PKCS_ECDSA_P256_SHA256, true)
}

pub fn signer_with(
    root: &RootCa,
    country: &str,
    alg: &'static rcgen::SignatureAlgorithm,
    with_aki: bool,
) -> Signer {
    let key = KeyPair::generate_for(alg).unwrap();
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, country);
    dn.push(DnType::CommonName, "Test Document Signer");
    params.distinguished_name = dn;
    params.is_ca = IsCa::NoCa;
    params.use_authority_key_identifier_extension = with_aki;
    params.serial_number = Some(SerialNumber::from_slice(&SIGNER_SERIAL));
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];

    let der = params
        .signed_by(&key, &root.issuer)
        .unwrap()
        .der()
        .to_vec();
    let key = PrivateKey::from_pkcs8_der(key.serialize_der()).unwrap();
    Signer { der, key }
}

/// A CRL issued by `root` listing the given serial numbers
pub fn crl(root: &RootCa, revoked: &[&[u8]]) -> Vec<u8> {
    let now = OffsetDateTime::now_utc();
    let params = CertificateRevocationListParams {
        this_update: now - Duration::days(1),
        next_update: now + Duration::days(30),
        crl_number: SerialNumber::from(1u64),
        issuing_distribution_point: None,
        revoked_certs: revoked
            .iter()
            .map(|serial| RevokedCertParams {
                serial_number: SerialNumber::from_slice(serial),
                revocation_time: now - Duration::hours(1),
                reason_code: Some(RevocationReason::KeyCompromise),
                invalidity_date: None,
            })
            .collect(),
        key_identifier_method: KeyIdMethod::Sha256,
    };
    params.signed_by(&root.issuer).unwrap().der().to_vec()
}

/// A P-521 country signing CA, built with openssl since ring has no P-521
pub struct P521Ca {
    pub key: PKey<Private>,
    pub cert: X509,
    pub der: Vec<u8>,
}

impl P521Ca {
    pub fn hash(&self) -> String {
        HashAlg::Sha256.hex_digest(&self.der).unwrap()
    }
}

fn x509_name(country: &str, common_name: &str) -> X509Name {
    let mut name = X509Name::builder().unwrap();
    name.append_entry_by_nid(Nid::COUNTRYNAME, country).unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    name.build()
}

fn serial(bytes: &[u8]) -> openssl::asn1::Asn1Integer {
    BigNum::from_slice(bytes).unwrap().to_asn1_integer().unwrap()
}

/// Self-signed P-521 root with a subject key identifier, signed with SHA-512
pub fn p521_root_ca(country: &str) -> P521Ca {
    let key = PrivateKey::generate(Curve::NistP521)
        .unwrap()
        .as_openssl_pkey()
        .clone();
    let name = x509_name(country, &format!("{country} CSCA"));

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial(&[0x01])).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
    builder
        .append_extension(X509BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .build()
                .unwrap(),
        )
        .unwrap();
    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(ski).unwrap();
    builder.sign(&key, MessageDigest::sha512()).unwrap();

    let cert = builder.build();
    let der = cert.to_der().unwrap();
    P521Ca { key, cert, der }
}

/// P-521 document signer issued by `root`, with an authority key identifier
pub fn p521_signer(root: &P521Ca, country: &str) -> Signer {
    let key = PrivateKey::generate(Curve::NistP521).unwrap();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial(&SIGNER_SERIAL)).unwrap();
    builder
        .set_subject_name(&x509_name(country, "Test Document Signer"))
        .unwrap();
    builder.set_issuer_name(root.cert.subject_name()).unwrap();
    builder.set_pubkey(key.as_openssl_pkey()).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(90).unwrap()).unwrap();
    let aki = AuthorityKeyIdentifier::new()
        .keyid(true)
        .build(&builder.x509v3_context(Some(&*root.cert), None))
        .unwrap();
    builder.append_extension(aki).unwrap();
    builder.sign(&root.key, MessageDigest::sha512()).unwrap();

    let der = builder.build().to_der().unwrap();
    Signer { der, key }
}

/// CRL signed by a P-521 root with SHA-512
pub fn p521_crl(root: &P521Ca, revoked: &[&[u8]]) -> Vec<u8> {
    let mut builder = X509CrlBuilder::new().unwrap();
    builder.set_issuer_name(root.cert.subject_name()).unwrap();
    builder
        .set_last_update(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_next_update(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    for serial_number in revoked {
        let mut entry = X509RevokedBuilder::new().unwrap();
        entry.set_serial_number(&serial(serial_number)).unwrap();
        entry
            .set_revocation_date(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder.add_revoked(entry.build()).unwrap();
    }

    // AuthorityKeyIdentifier ::= SEQUENCE { [0] keyIdentifier }
    let key_id = root.cert.subject_key_id().unwrap().as_slice();
    let mut aki = vec![0x30, key_id.len() as u8 + 2, 0x80, key_id.len() as u8];
    aki.extend_from_slice(key_id);
    let aki = X509Extension::new_from_der(
        &Asn1Object::from_str("2.5.29.35").unwrap(),
        false,
        &Asn1OctetString::new_from_bytes(&aki).unwrap(),
    )
    .unwrap();
    builder.append_extension(aki).unwrap();
    builder
        .append_extension(
            CrlNumber::new(BigNum::from_u32(1).unwrap())
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap();
    builder.sign(&root.key, MessageDigest::sha512()).unwrap();

    builder.build().unwrap().to_der().unwrap()
}

/// Compact `data` member of a vaccination record
pub fn record_data(uvci: &str, country: &str) -> String {
    serde_json::json!({
        "hdr": { "t": "icao.vacc", "v": 1, "is": country },
        "msg": {
            "uvci": uvci,
            "pid": {
                "n": PERSON_NAME,
                "dob": "1961-05-15",
                "sex": "F",
                "i": "PA0941262"
            },
            "ve": [{
                "des": "XM68M6",
                "nam": "AstraZeneca Vaxzevria",
                "dis": "RA01.0",
                "vd": [{
                    "dvc": "2021-09-15",
                    "seq": 1,
                    "ctr": "AUS",
                    "adm": "General Practitioner",
                    "lot": "300157P"
                }]
            }]
        }
    })
    .to_string()
}

/// Full record text with a signature over `data`
pub fn signed_record(data: &str, signer: &Signer, alg: &str) -> String {
    let hash = match alg {
        "ES384" => HashAlg::Sha384,
        "ES512" => HashAlg::Sha512,
        _ => HashAlg::Sha256,
    };
    let signature = ecdsa::sign(&signer.key, data.as_bytes(), hash).unwrap();
    record(
        data,
        alg,
        &URL_SAFE_NO_PAD.encode(&signer.der),
        &URL_SAFE_NO_PAD.encode(signature.raw_signature()),
    )
}

/// Record text from already encoded parts
pub fn record(data: &str, alg: &str, cer: &str, sigvl: &str) -> String {
    format!(r#"{{"data":{data},"sig":{{"alg":"{alg}","cer":"{cer}","sigvl":"{sigvl}"}}}}"#)
}

pub fn decode(record: &str) -> Vds {
    VdsReader::new().decode(record).unwrap()
}

/// A root, a signer it issued and a valid specimen record
pub struct Fixture {
    pub root: RootCa,
    pub signer: Signer,
    pub record: String,
}

impl Fixture {
    pub fn new() -> Self {
        let root = root_ca("AU");
        let signer = signer(&root, "AU");
        let record = signed_record(&record_data("VB0009990012", "AUS"), &signer, "ES256");
        Self {
            root,
            signer,
            record,
        }
    }

    pub fn vds(&self) -> Vds {
        decode(&self.record)
    }
}
