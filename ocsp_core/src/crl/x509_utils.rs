//! Certificate helpers shared by the import engine.

use snafu::ResultExt;
use x509_parser::prelude::*;

use crate::crl::error::{CertParseSnafu, CrlError, DerSnafu, IoSnafu, PemParseSnafu};
use crate::der::{self, DerCursor};

/// Load a certificate file as DER bytes, accepting PEM or raw DER.
pub fn load_cert_bytes(path: &std::path::Path) -> Result<Vec<u8>, CrlError> {
    let raw = std::fs::read(path).context(IoSnafu {
        path: path.display().to_string(),
    })?;
    to_der(raw)
}

/// Unwrap a PEM envelope when present, otherwise pass DER through.
pub fn to_der(raw: Vec<u8>) -> Result<Vec<u8>, CrlError> {
    if raw.starts_with(b"-----") {
        let (_, pem) = x509_parser::pem::parse_x509_pem(&raw).context(PemParseSnafu)?;
        Ok(pem.contents)
    } else {
        Ok(raw)
    }
}

/// Subject Key Identifier extension value, if present.
pub fn extract_skid(cert: &X509Certificate<'_>) -> Option<Vec<u8>> {
    for ext in cert.extensions() {
        if let ParsedExtension::SubjectKeyIdentifier(skid) = ext.parsed_extension() {
            return Some(skid.0.to_vec());
        }
    }
    None
}

/// Authority Key Identifier key id, if present.
pub fn extract_akid(cert: &X509Certificate<'_>) -> Option<Vec<u8>> {
    for ext in cert.extensions() {
        if let ParsedExtension::AuthorityKeyIdentifier(akid) = ext.parsed_extension()
            && let Some(key_id) = &akid.key_identifier
        {
            return Some(key_id.0.to_vec());
        }
    }
    None
}

/// Serial number as lowercase hex of the positive magnitude. Leading zero
/// bytes of the DER encoding are not preserved.
pub fn serial_hex(cert: &X509Certificate<'_>) -> String {
    cert.serial.to_str_radix(16)
}

/// Validity bounds as epoch seconds.
pub fn validity_seconds(cert: &X509Certificate<'_>) -> (i64, i64) {
    (
        cert.validity.not_before.to_datetime().unix_timestamp(),
        cert.validity.not_after.to_datetime().unix_timestamp(),
    )
}

fn attr_short_name(oid: &str) -> Option<&'static str> {
    // RFC 4519 attribute short names for the types seen in practice.
    match oid {
        "2.5.4.3" => Some("CN"),
        "2.5.4.4" => Some("SN"),
        "2.5.4.5" => Some("SERIALNUMBER"),
        "2.5.4.6" => Some("C"),
        "2.5.4.7" => Some("L"),
        "2.5.4.8" => Some("ST"),
        "2.5.4.9" => Some("STREET"),
        "2.5.4.10" => Some("O"),
        "2.5.4.11" => Some("OU"),
        "0.9.2342.19200300.100.1.25" => Some("DC"),
        "1.2.840.113549.1.9.1" => Some("emailAddress"),
        _ => None,
    }
}

fn attr_value_string(tag: u8, content: &[u8]) -> String {
    match tag {
        der::TAG_UTF8_STRING
        | der::TAG_PRINTABLE_STRING
        | der::TAG_IA5_STRING
        | der::TAG_TELETEX_STRING => String::from_utf8_lossy(content).into_owned(),
        _ => format!("#{}", hex::encode(content)),
    }
}

/// Render a DER-encoded `Name` in RFC 4519 string form: most-specific RDN
/// first, attributes joined with `+` inside one RDN, RDNs joined with `,`,
/// no whitespace.
pub fn rfc4519_name(name_der: &[u8]) -> Result<String, CrlError> {
    let mut outer = DerCursor::new(name_der);
    let rdn_seq = outer.expect(der::TAG_SEQUENCE).context(DerSnafu)?;
    let mut rdns: Vec<String> = Vec::new();
    let mut cursor = DerCursor::new(rdn_seq);
    while !cursor.is_empty() {
        let set = cursor.expect(der::TAG_SET).context(DerSnafu)?;
        let mut atv_cursor = DerCursor::new(set);
        let mut attrs: Vec<String> = Vec::new();
        while !atv_cursor.is_empty() {
            let atv = atv_cursor.expect(der::TAG_SEQUENCE).context(DerSnafu)?;
            let mut inner = DerCursor::new(atv);
            let oid = inner.expect(der::TAG_OID).context(DerSnafu)?;
            let (tag, value) = inner.read_tlv().context(DerSnafu)?;
            let oid_str = der::oid_to_string(oid);
            let key = attr_short_name(&oid_str)
                .map(str::to_string)
                .unwrap_or(oid_str);
            attrs.push(format!("{key}={}", attr_value_string(tag, value)));
        }
        rdns.push(attrs.join("+"));
    }
    rdns.reverse();
    Ok(rdns.join(","))
}

/// Parse a DER certificate; the result borrows from the input bytes.
pub fn parse_cert(der_bytes: &[u8]) -> Result<X509Certificate<'_>, CrlError> {
    let (_, cert) = X509Certificate::from_der(der_bytes).context(CertParseSnafu)?;
    Ok(cert)
}
