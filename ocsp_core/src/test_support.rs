//! Shared test fixtures: openssl-generated CA material and a DER CRL
//! builder signed with real keys, so parser and importer tests run against
//! cryptographically valid inputs.

use chrono::{DateTime, Utc};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::x509::extension::{AuthorityKeyIdentifier, BasicConstraints, SubjectKeyIdentifier};
use openssl::x509::{X509, X509Name, X509NameBuilder};

use crate::der::{self, oids};

pub fn test_setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub struct TestCa {
    pub key: PKey<Private>,
    pub cert: X509,
    pub der: Vec<u8>,
}

pub fn gen_key() -> PKey<Private> {
    let rsa = Rsa::generate(2048).expect("rsa");
    PKey::from_rsa(rsa).expect("pkey")
}

fn build_name(attrs: &[(&str, &str)]) -> X509Name {
    let mut builder = X509NameBuilder::new().expect("name builder");
    for (key, value) in attrs {
        builder.append_entry_by_text(key, value).expect("name attr");
    }
    builder.build()
}

/// Self-signed CA with BasicConstraints and a Subject Key Identifier.
pub fn make_ca_with_name(attrs: &[(&str, &str)]) -> TestCa {
    let key = gen_key();
    let name = build_name(attrs);
    let mut builder = X509::builder().expect("cert builder");
    builder.set_version(2).expect("version");
    let serial = BigNum::from_u32(1)
        .and_then(|bn| bn.to_asn1_integer())
        .expect("serial");
    builder.set_serial_number(&serial).expect("set serial");
    builder.set_subject_name(&name).expect("subject");
    builder.set_issuer_name(&name).expect("issuer");
    builder.set_pubkey(&key).expect("pubkey");
    builder
        .set_not_before(&Asn1Time::days_from_now(0).expect("nb"))
        .expect("set nb");
    builder
        .set_not_after(&Asn1Time::days_from_now(365).expect("na"))
        .expect("set na");
    let bc = BasicConstraints::new().critical().ca().build().expect("bc");
    builder.append_extension(bc).expect("append bc");
    let ski = {
        let ctx = builder.x509v3_context(None, None);
        SubjectKeyIdentifier::new().build(&ctx).expect("ski")
    };
    builder.append_extension(ski).expect("append ski");
    builder.sign(&key, MessageDigest::sha256()).expect("sign");
    let cert = builder.build();
    let der = cert.to_der().expect("der");
    TestCa { key, cert, der }
}

pub fn make_ca(cn: &str) -> TestCa {
    make_ca_with_name(&[("CN", cn)])
}

/// End-entity certificate issued by `ca`, carrying an AKI that points at
/// the key of `aki_source` (normally the CA itself; pass a different CA to
/// fabricate cross-CA material).
pub fn make_ee_cert_with_aki(
    ca: &TestCa,
    aki_source: &TestCa,
    cn: &str,
    serial: u32,
) -> (PKey<Private>, Vec<u8>) {
    let key = gen_key();
    let name = build_name(&[("CN", cn)]);
    let mut builder = X509::builder().expect("cert builder");
    builder.set_version(2).expect("version");
    let serial = BigNum::from_u32(serial)
        .and_then(|bn| bn.to_asn1_integer())
        .expect("serial");
    builder.set_serial_number(&serial).expect("set serial");
    builder.set_subject_name(&name).expect("subject");
    builder
        .set_issuer_name(ca.cert.subject_name())
        .expect("issuer");
    builder.set_pubkey(&key).expect("pubkey");
    builder
        .set_not_before(&Asn1Time::days_from_now(0).expect("nb"))
        .expect("set nb");
    builder
        .set_not_after(&Asn1Time::days_from_now(90).expect("na"))
        .expect("set na");
    let aki = {
        let ctx = builder.x509v3_context(Some(&aki_source.cert), None);
        AuthorityKeyIdentifier::new()
            .keyid(true)
            .build(&ctx)
            .expect("aki")
    };
    builder.append_extension(aki).expect("append aki");
    builder.sign(&ca.key, MessageDigest::sha256()).expect("sign");
    let der = builder.build().to_der().expect("der");
    (key, der)
}

pub fn make_ee_cert(ca: &TestCa, cn: &str, serial: u32) -> (PKey<Private>, Vec<u8>) {
    make_ee_cert_with_aki(ca, ca, cn, serial)
}

/// Delegated CRL-signer certificate issued by `ca`.
pub fn make_delegate(ca: &TestCa, cn: &str) -> (PKey<Private>, X509) {
    let key = gen_key();
    let name = build_name(&[("CN", cn)]);
    let mut builder = X509::builder().expect("cert builder");
    builder.set_version(2).expect("version");
    let serial = BigNum::from_u32(99)
        .and_then(|bn| bn.to_asn1_integer())
        .expect("serial");
    builder.set_serial_number(&serial).expect("set serial");
    builder.set_subject_name(&name).expect("subject");
    builder
        .set_issuer_name(ca.cert.subject_name())
        .expect("issuer");
    builder.set_pubkey(&key).expect("pubkey");
    builder
        .set_not_before(&Asn1Time::days_from_now(0).expect("nb"))
        .expect("set nb");
    builder
        .set_not_after(&Asn1Time::days_from_now(365).expect("na"))
        .expect("set na");
    builder.sign(&ca.key, MessageDigest::sha256()).expect("sign");
    (key, builder.build())
}

/// DER of a certificate's subject Name.
pub fn subject_der(cert: &X509) -> Vec<u8> {
    cert.subject_name().to_der().expect("subject der")
}

/// DER SubjectPublicKeyInfo of a certificate's key.
pub fn spki_der(cert: &X509) -> Vec<u8> {
    cert.public_key()
        .expect("pubkey")
        .public_key_to_der()
        .expect("spki der")
}

fn generalized_time(t: DateTime<Utc>) -> [u8; der::GENERALIZED_TIME_LEN] {
    let mut buf = [0u8; der::GENERALIZED_TIME_LEN];
    der::write_generalized_time(t, &mut buf, 0);
    buf
}

fn extension(oid: &const_oid::ObjectIdentifier, critical: bool, inner: &[u8]) -> Vec<u8> {
    let mut content = der::tlv(der::TAG_OID, oid.as_bytes());
    if critical {
        content.extend_from_slice(&der::tlv(der::TAG_BOOLEAN, &[0xFF]));
    }
    content.extend_from_slice(&der::tlv(der::TAG_OCTET_STRING, inner));
    der::tlv(der::TAG_SEQUENCE, &content)
}

#[derive(Clone)]
pub struct EntrySpec {
    serial: u128,
    date: DateTime<Utc>,
    reason: Option<u8>,
    invalidity: Option<DateTime<Utc>>,
    cert_issuer: Option<Vec<u8>>,
}

impl EntrySpec {
    pub fn new(serial: u128, date: DateTime<Utc>) -> EntrySpec {
        EntrySpec {
            serial,
            date,
            reason: None,
            invalidity: None,
            cert_issuer: None,
        }
    }

    pub fn reason(mut self, code: u8) -> EntrySpec {
        self.reason = Some(code);
        self
    }

    pub fn invalidity(mut self, t: DateTime<Utc>) -> EntrySpec {
        self.invalidity = Some(t);
        self
    }

    pub fn certificate_issuer(mut self, name_der: Vec<u8>) -> EntrySpec {
        self.cert_issuer = Some(name_der);
        self
    }

    fn encode(&self) -> Vec<u8> {
        let mut content = der::encode_integer(&der::uint_magnitude(self.serial));
        content.extend_from_slice(&generalized_time(self.date));

        let mut exts = Vec::new();
        if let Some(code) = self.reason {
            exts.extend_from_slice(&extension(
                &oids::REASON_CODE,
                false,
                &der::tlv(der::TAG_ENUMERATED, &[code]),
            ));
        }
        if let Some(t) = self.invalidity {
            exts.extend_from_slice(&extension(
                &oids::INVALIDITY_DATE,
                false,
                &generalized_time(t),
            ));
        }
        if let Some(name_der) = &self.cert_issuer {
            let general_names = der::tlv(der::TAG_SEQUENCE, &der::explicit(4, name_der));
            exts.extend_from_slice(&extension(&oids::CERTIFICATE_ISSUER, true, &general_names));
        }
        if !exts.is_empty() {
            content.extend_from_slice(&der::tlv(der::TAG_SEQUENCE, &exts));
        }
        der::tlv(der::TAG_SEQUENCE, &content)
    }
}

/// One element of the proprietary in-CRL certificate set.
#[derive(Clone)]
pub struct CertsetEntry {
    pub serial: u128,
    pub cert_der: Option<Vec<u8>>,
    pub profile: Option<String>,
}

impl CertsetEntry {
    fn encode(&self) -> Vec<u8> {
        let mut content = der::encode_integer(&der::uint_magnitude(self.serial));
        if let Some(cert) = &self.cert_der {
            content.extend_from_slice(&der::explicit(0, cert));
        }
        if let Some(profile) = &self.profile {
            content.extend_from_slice(&der::explicit(
                1,
                &der::tlv(der::TAG_UTF8_STRING, profile.as_bytes()),
            ));
        }
        der::tlv(der::TAG_SEQUENCE, &content)
    }
}

/// Hand-assembled, properly signed CertificateList.
pub struct CrlBuilder<'a> {
    ca: &'a TestCa,
    delegate: Option<(&'a PKey<Private>, &'a X509)>,
    number: u128,
    base: Option<u128>,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    entries: Vec<EntrySpec>,
    certset: Vec<CertsetEntry>,
    omit_number: bool,
}

impl<'a> CrlBuilder<'a> {
    pub fn new(ca: &'a TestCa, number: u128) -> CrlBuilder<'a> {
        CrlBuilder {
            ca,
            delegate: None,
            number,
            base: None,
            this_update: Utc::now(),
            next_update: None,
            entries: Vec::new(),
            certset: Vec::new(),
            omit_number: false,
        }
    }

    /// Sign with a delegated CRL signer; its subject becomes the issuer.
    pub fn delegate(mut self, key: &'a PKey<Private>, cert: &'a X509) -> CrlBuilder<'a> {
        self.delegate = Some((key, cert));
        self
    }

    pub fn this_update(mut self, t: DateTime<Utc>) -> CrlBuilder<'a> {
        self.this_update = t;
        self
    }

    pub fn next_update(mut self, t: DateTime<Utc>) -> CrlBuilder<'a> {
        self.next_update = Some(t);
        self
    }

    pub fn base_crl_number(mut self, base: u128) -> CrlBuilder<'a> {
        self.base = Some(base);
        self
    }

    pub fn entry(mut self, entry: EntrySpec) -> CrlBuilder<'a> {
        self.entries.push(entry);
        self
    }

    pub fn certset_entry(mut self, entry: CertsetEntry) -> CrlBuilder<'a> {
        self.certset.push(entry);
        self
    }

    pub fn omit_crl_number(mut self) -> CrlBuilder<'a> {
        self.omit_number = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let (sign_key, issuer_cert): (&PKey<Private>, &X509) = match self.delegate {
            Some((key, cert)) => (key, cert),
            None => (&self.ca.key, &self.ca.cert),
        };
        let issuer_der = subject_der(issuer_cert);

        // AlgorithmIdentifier { sha256WithRSAEncryption, NULL }
        let mut alg_content = der::tlv(der::TAG_OID, oids::RSA_WITH_SHA256.as_bytes());
        alg_content.extend_from_slice(&der::tlv(der::TAG_NULL, &[]));
        let sig_alg = der::tlv(der::TAG_SEQUENCE, &alg_content);

        let mut tbs_content = der::tlv(der::TAG_INTEGER, &[1]); // v2
        tbs_content.extend_from_slice(&sig_alg);
        tbs_content.extend_from_slice(&issuer_der);
        tbs_content.extend_from_slice(&generalized_time(self.this_update));
        if let Some(t) = self.next_update {
            tbs_content.extend_from_slice(&generalized_time(t));
        }
        if !self.entries.is_empty() {
            let mut list = Vec::new();
            for entry in &self.entries {
                list.extend_from_slice(&entry.encode());
            }
            tbs_content.extend_from_slice(&der::tlv(der::TAG_SEQUENCE, &list));
        }

        let mut exts = Vec::new();
        if !self.omit_number {
            exts.extend_from_slice(&extension(
                &oids::CRL_NUMBER,
                false,
                &der::encode_integer(&der::uint_magnitude(self.number)),
            ));
        }
        if let Some(base) = self.base {
            exts.extend_from_slice(&extension(
                &oids::DELTA_CRL_INDICATOR,
                true,
                &der::encode_integer(&der::uint_magnitude(base)),
            ));
        }
        if !self.certset.is_empty() {
            let mut set = Vec::new();
            for entry in &self.certset {
                set.extend_from_slice(&entry.encode());
            }
            exts.extend_from_slice(&extension(
                &oids::XIPKI_CRL_CERTSET,
                false,
                &der::tlv(der::TAG_SET, &set),
            ));
        }
        if !exts.is_empty() {
            tbs_content.extend_from_slice(&der::explicit(
                0,
                &der::tlv(der::TAG_SEQUENCE, &exts),
            ));
        }
        let tbs = der::tlv(der::TAG_SEQUENCE, &tbs_content);

        let mut signer =
            Signer::new(MessageDigest::sha256(), sign_key).expect("signer");
        signer.update(&tbs).expect("sign update");
        let signature = signer.sign_to_vec().expect("sign");

        let mut sig_content = vec![0u8];
        sig_content.extend_from_slice(&signature);

        let mut crl = tbs;
        crl.extend_from_slice(&sig_alg);
        crl.extend_from_slice(&der::tlv(der::TAG_BIT_STRING, &sig_content));
        der::tlv(der::TAG_SEQUENCE, &crl)
    }
}

/// Lay out a baseline import directory (`ca.crt`, `ca.crl`).
pub fn write_import_dir(dir: &std::path::Path, ca: &TestCa, crl: &[u8]) {
    std::fs::write(dir.join("ca.crt"), &ca.der).expect("write ca.crt");
    std::fs::write(dir.join("ca.crl"), crl).expect("write ca.crl");
}
