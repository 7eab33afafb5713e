//! Precomputed DER templates for OCSP single-response assembly.
//!
//! All ASN.1 work happens once at initialization. Hot-path calls reduce to
//! a copy of a cached prefix or blob plus a timestamp rewrite and, for
//! revoked-info, one reason byte. The byte layouts here are part of the
//! public interface: cached responses embed them verbatim.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use snafu::{Location, Snafu, ensure};

use crate::crl::CrlReason;
use crate::der::{self, GENERALIZED_TIME_LEN, oids, write_generalized_time};
use crate::hash::HashAlgo;

/// Encoded revoked-info without a reason: `A1 11` + GeneralizedTime.
pub const REVOKED_INFO_LEN: usize = 2 + GENERALIZED_TIME_LEN;
/// Encoded revoked-info with a reason: adds `A0 03 0A 01 <code>`.
pub const REVOKED_INFO_WITH_REASON_LEN: usize = REVOKED_INFO_LEN + 5;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum TemplateError {
    #[snafu(display("{algo} digest must be {expected} bytes, got {got}"))]
    InvalidHashLength {
        algo: HashAlgo,
        expected: usize,
        got: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Read-only after construction; share freely across responders.
pub struct ResponseTemplates {
    cert_hash_prefixes: Vec<Vec<u8>>,
    invalidity_blob: Vec<u8>,
    archive_cutoff_blob: Vec<u8>,
}

fn extension(oid_der: &[u8], extn_value: &[u8]) -> Vec<u8> {
    // criticality is FALSE for every template here, so the DEFAULT is omitted.
    let mut content = der::tlv(der::TAG_OID, oid_der);
    content.extend_from_slice(&der::tlv(der::TAG_OCTET_STRING, extn_value));
    der::tlv(der::TAG_SEQUENCE, &content)
}

fn build_cert_hash_extension(algo: HashAlgo) -> Vec<u8> {
    let alg_id = der::tlv(der::TAG_SEQUENCE, &der::tlv(der::TAG_OID, algo.oid_der()));
    let zero_hash = vec![0u8; algo.len()];
    let mut cert_hash = alg_id;
    cert_hash.extend_from_slice(&der::tlv(der::TAG_OCTET_STRING, &zero_hash));
    let cert_hash = der::tlv(der::TAG_SEQUENCE, &cert_hash);
    extension(oids::ISISMTT_CERT_HASH.as_bytes(), &cert_hash)
}

fn build_time_extension(oid_der: &[u8]) -> Vec<u8> {
    extension(oid_der, &[0u8; GENERALIZED_TIME_LEN])
}

impl ResponseTemplates {
    pub fn new() -> ResponseTemplates {
        let cert_hash_prefixes = HashAlgo::ALL
            .iter()
            .map(|algo| {
                let full = build_cert_hash_extension(*algo);
                let prefix_len = full.len() - algo.len();
                full[..prefix_len].to_vec()
            })
            .collect();
        ResponseTemplates {
            cert_hash_prefixes,
            invalidity_blob: build_time_extension(oids::INVALIDITY_DATE.as_bytes()),
            archive_cutoff_blob: build_time_extension(oids::PKIX_OCSP_ARCHIVE_CUTOFF.as_bytes()),
        }
    }

    /// Process-wide instance, initialized on first use.
    pub fn global() -> &'static ResponseTemplates {
        static INSTANCE: OnceCell<ResponseTemplates> = OnceCell::new();
        INSTANCE.get_or_init(ResponseTemplates::new)
    }

    /// `id-isismtt-at-certHash` extension for an already-computed digest.
    /// The digest length must match the algorithm; anything else is a
    /// caller bug surfaced as an invalid-argument failure.
    pub fn cert_hash_extension(
        &self,
        algo: HashAlgo,
        hash: &[u8],
    ) -> Result<Vec<u8>, TemplateError> {
        ensure!(hash.len() == algo.len(), InvalidHashLengthSnafu {
            algo,
            expected: algo.len(),
            got: hash.len(),
        });
        let prefix = &self.cert_hash_prefixes[algo.index()];
        let mut out = Vec::with_capacity(prefix.len() + hash.len());
        out.extend_from_slice(prefix);
        out.extend_from_slice(hash);
        Ok(out)
    }

    /// `invalidityDate` extension carrying `t` truncated to whole seconds.
    pub fn invalidity_date_extension(&self, t: DateTime<Utc>) -> Vec<u8> {
        let mut out = self.invalidity_blob.clone();
        let offset = out.len() - GENERALIZED_TIME_LEN;
        write_generalized_time(t, &mut out, offset);
        out
    }

    /// `id-pkix-ocsp-archive-cutoff` extension carrying `t`.
    pub fn archive_cutoff_extension(&self, t: DateTime<Utc>) -> Vec<u8> {
        let mut out = self.archive_cutoff_blob.clone();
        let offset = out.len() - GENERALIZED_TIME_LEN;
        write_generalized_time(t, &mut out, offset);
        out
    }

    /// `[1] EXPLICIT RevokedInfo`: 19 bytes without a reason, 24 with one.
    /// Reason codes are one byte by contract.
    pub fn encode_revoked_info(&self, reason: Option<CrlReason>, t: DateTime<Utc>) -> Vec<u8> {
        match reason {
            None => {
                let mut out = vec![0u8; REVOKED_INFO_LEN];
                out[0] = 0xA1;
                out[1] = 0x11;
                write_generalized_time(t, &mut out, 2);
                out
            }
            Some(r) => {
                let mut out = vec![0u8; REVOKED_INFO_WITH_REASON_LEN];
                out[0] = 0xA1;
                out[1] = 0x16;
                write_generalized_time(t, &mut out, 2);
                out[19] = 0xA0;
                out[20] = 0x03;
                out[21] = 0x0A;
                out[22] = 0x01;
                out[23] = r.code();
                out
            }
        }
    }
}

impl Default for ResponseTemplates {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::der::DerCursor;
    use chrono::TimeZone;

    #[test]
    fn cert_hash_sha256_matches_byte_exact_der() {
        let templates = ResponseTemplates::new();
        let got = templates
            .cert_hash_extension(HashAlgo::Sha256, &[0u8; 32])
            .unwrap();
        let mut expected = vec![
            0x30, 0x3A, // Extension SEQUENCE
            0x06, 0x05, 0x2B, 0x24, 0x08, 0x03, 0x0D, // 1.3.36.8.3.13
            0x04, 0x31, // extnValue OCTET STRING
            0x30, 0x2F, // CertHash SEQUENCE
            0x30, 0x0B, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
            0x01, // AlgorithmIdentifier { sha256 }
            0x04, 0x20, // certificateHash OCTET STRING
        ];
        expected.extend_from_slice(&[0u8; 32]);
        assert_eq!(got, expected);
    }

    #[test]
    fn cert_hash_parses_back_for_every_algo() {
        let templates = ResponseTemplates::new();
        for algo in HashAlgo::ALL {
            let hash: Vec<u8> = (0..algo.len() as u8).collect();
            let ext = templates.cert_hash_extension(algo, &hash).unwrap();

            let mut outer = DerCursor::new(&ext);
            let ext_content = outer.expect(crate::der::TAG_SEQUENCE).unwrap();
            let mut cursor = DerCursor::new(ext_content);
            let oid = cursor.expect(crate::der::TAG_OID).unwrap();
            assert_eq!(crate::der::oid_to_string(oid), "1.3.36.8.3.13");
            // No BOOLEAN: criticality FALSE is omitted in DER.
            let value = cursor.expect(crate::der::TAG_OCTET_STRING).unwrap();

            let mut cert_hash = DerCursor::new(value);
            let body = cert_hash.expect(crate::der::TAG_SEQUENCE).unwrap();
            let mut body = DerCursor::new(body);
            let alg = body.expect(crate::der::TAG_SEQUENCE).unwrap();
            let mut alg = DerCursor::new(alg);
            assert_eq!(alg.expect(crate::der::TAG_OID).unwrap(), algo.oid_der());
            assert_eq!(
                body.expect(crate::der::TAG_OCTET_STRING).unwrap(),
                &hash[..]
            );
        }
    }

    #[test]
    fn cert_hash_rejects_wrong_length() {
        let templates = ResponseTemplates::new();
        let err = templates
            .cert_hash_extension(HashAlgo::Sha256, &[0u8; 20])
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidHashLength {
            expected: 32,
            got: 20,
            ..
        }));
    }

    #[test]
    fn invalidity_date_parses_to_truncated_utc() {
        let templates = ResponseTemplates::new();
        let t = Utc.with_ymd_and_hms(2031, 7, 4, 1, 2, 3).unwrap();
        let ext = templates.invalidity_date_extension(t);

        let mut outer = DerCursor::new(&ext);
        let content = outer.expect(crate::der::TAG_SEQUENCE).unwrap();
        let mut cursor = DerCursor::new(content);
        let oid = cursor.expect(crate::der::TAG_OID).unwrap();
        assert_eq!(crate::der::oid_to_string(oid), "2.5.29.24");
        let value = cursor.expect(crate::der::TAG_OCTET_STRING).unwrap();
        let mut time = DerCursor::new(value);
        let gt = time.expect(crate::der::TAG_GENERALIZED_TIME).unwrap();
        assert_eq!(gt, b"20310704010203Z");
    }

    #[test]
    fn archive_cutoff_carries_its_oid_and_time() {
        let templates = ResponseTemplates::new();
        let t = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
        let ext = templates.archive_cutoff_extension(t);

        let mut outer = DerCursor::new(&ext);
        let content = outer.expect(crate::der::TAG_SEQUENCE).unwrap();
        let mut cursor = DerCursor::new(content);
        let oid = cursor.expect(crate::der::TAG_OID).unwrap();
        assert_eq!(crate::der::oid_to_string(oid), "1.3.6.1.5.5.7.48.1.6");
        let value = cursor.expect(crate::der::TAG_OCTET_STRING).unwrap();
        assert_eq!(&value[2..], b"20170101000000Z");
    }

    #[test]
    fn revoked_info_widths_are_fixed() {
        let templates = ResponseTemplates::new();
        let t = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        assert_eq!(templates.encode_revoked_info(None, t).len(), 19);
        assert_eq!(
            templates
                .encode_revoked_info(Some(CrlReason::AaCompromise), t)
                .len(),
            24
        );
    }

    #[test]
    fn revoked_info_with_reason_matches_byte_exact_vector() {
        let templates = ResponseTemplates::new();
        let t = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let got = templates.encode_revoked_info(Some(CrlReason::KeyCompromise), t);
        let expected: [u8; 24] = [
            0xA1, 0x16, 0x18, 0x0F, 0x32, 0x30, 0x32, 0x34, 0x30, 0x36, 0x31, 0x35, 0x31, 0x32,
            0x30, 0x30, 0x30, 0x30, 0x5A, 0xA0, 0x03, 0x0A, 0x01, 0x01,
        ];
        assert_eq!(got, expected);
        assert_eq!(got[23], CrlReason::KeyCompromise.code());
    }

    #[test]
    fn revoked_info_without_reason_is_time_only() {
        let templates = ResponseTemplates::new();
        let t = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let got = templates.encode_revoked_info(None, t);
        assert_eq!(&got[..2], &[0xA1, 0x11]);
        assert_eq!(&got[2..4], &[0x18, 0x0F]);
        assert_eq!(&got[4..], b"20240615120000Z");
    }

    #[test]
    fn global_instance_is_shared() {
        let a = ResponseTemplates::global() as *const _;
        let b = ResponseTemplates::global() as *const _;
        assert_eq!(a, b);
    }
}
