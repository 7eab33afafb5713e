//! Streaming CRL file parser.
//!
//! A `CrlFile` performs one buffered header pass over the file: it captures
//! the issuer, both update times, the CRL-level extensions and the byte
//! spans of the TBS certList and the revokedCertificates list. The revoked
//! list itself is skipped with a seek and only ever consumed entry-by-entry
//! through [`CrlFile::revoked_certificates`], so CRLs of hundreds of
//! megabytes are never held in memory.
//!
//! Callers must run [`CrlFile::verify_signature`] before consuming the
//! entry iterator; the import engine always does.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Verifier;
use snafu::{OptionExt, ResultExt, ensure};
use x509_parser::prelude::*;

use crate::crl::error::{
    CrlError, CrlNumberRangeSnafu, DerSnafu, EntryParseSnafu, IoSnafu, MalformedSnafu,
    MissingCrlNumberSnafu, SignatureCheckSnafu, UnsupportedSignatureAlgorithmSnafu,
};
use crate::crl::reason::CrlReason;
use crate::der::{self, DerCursor, TlvHeader, oids, read_tlv_header};

#[derive(Debug, Clone, Copy)]
struct Span {
    offset: u64,
    len: u64,
}

/// One CRL-level extension, kept raw.
#[derive(Debug, Clone)]
pub struct RawExtension {
    /// OID content octets.
    pub oid: Vec<u8>,
    pub critical: bool,
    /// extnValue content (the octets inside the OCTET STRING).
    pub value: Vec<u8>,
}

impl RawExtension {
    pub fn oid_string(&self) -> String {
        der::oid_to_string(&self.oid)
    }
}

/// One revoked-certificate entry, decoded from the stream.
#[derive(Debug, Clone)]
pub struct RevokedEntry {
    /// Lowercase hex of the positive serial magnitude.
    pub serial_hex: String,
    /// Revocation time, epoch seconds.
    pub revocation_date: i64,
    /// invalidityDate entry extension, epoch seconds.
    pub invalidity_date: Option<i64>,
    /// reasonCode entry extension; `Unspecified` when absent.
    pub reason: CrlReason,
    /// Raw DER `Name` from the certificateIssuer entry extension.
    pub certificate_issuer: Option<Vec<u8>>,
}

/// Parsed CRL header over an on-disk file.
#[derive(Debug)]
pub struct CrlFile {
    path: PathBuf,
    issuer_raw: Vec<u8>,
    issuer_name: String,
    this_update: i64,
    next_update: Option<i64>,
    sig_alg_oid: Vec<u8>,
    signature: Vec<u8>,
    tbs_span: Span,
    revoked_span: Option<Span>,
    crl_number: u128,
    base_crl_number: Option<u128>,
    extensions: Vec<RawExtension>,
}

struct CountingReader<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl CountingReader<BufReader<File>> {
    fn skip(&mut self, n: u64) -> std::io::Result<()> {
        self.inner.seek_relative(n as i64)?;
        self.pos += n;
        Ok(())
    }
}

fn io_ctx(path: &Path) -> IoSnafu<String> {
    IoSnafu {
        path: path.display().to_string(),
    }
}

fn malformed(what: &str) -> CrlError {
    MalformedSnafu { what }.build()
}

fn read_exact_vec(
    r: &mut CountingReader<BufReader<File>>,
    len: usize,
    path: &Path,
) -> Result<Vec<u8>, CrlError> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).context(io_ctx(path))?;
    Ok(buf)
}

/// Read the full TLV whose header was just consumed, re-assembling the
/// header bytes in front of the content.
fn read_tlv_body(
    r: &mut CountingReader<BufReader<File>>,
    hdr: TlvHeader,
    path: &Path,
) -> Result<Vec<u8>, CrlError> {
    let mut buf = Vec::with_capacity(hdr.total_len());
    buf.push(hdr.tag);
    der::write_len(hdr.len, &mut buf);
    let start = buf.len();
    buf.resize(start + hdr.len, 0);
    r.read_exact(&mut buf[start..]).context(io_ctx(path))?;
    Ok(buf)
}

fn parse_uint_content(content: &[u8]) -> Result<u128, CrlError> {
    let trimmed = {
        let skip = content.iter().take_while(|&&b| b == 0).count();
        &content[skip..]
    };
    ensure!(trimmed.len() <= 16, CrlNumberRangeSnafu);
    Ok(trimmed.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128))
}

fn parse_integer_extension(value: &[u8]) -> Result<u128, CrlError> {
    let mut cursor = DerCursor::new(value);
    let content = cursor.expect(der::TAG_INTEGER).context(DerSnafu)?;
    parse_uint_content(content)
}

/// Pull the Name DER out of a certificateIssuer GeneralNames value.
fn parse_certificate_issuer(value: &[u8]) -> Option<Vec<u8>> {
    let mut outer = DerCursor::new(value);
    let names = outer.expect(der::TAG_SEQUENCE).ok()?;
    let mut cursor = DerCursor::new(names);
    while !cursor.is_empty() {
        let (tag, content) = cursor.read_tlv().ok()?;
        // directoryName is [4], constructed, wrapping the Name.
        if tag == 0xA4 {
            let mut inner = DerCursor::new(content);
            let (_, name_raw) = inner.read_tlv_raw().ok()?;
            return Some(name_raw.to_vec());
        }
    }
    None
}

impl CrlFile {
    /// Parse the CRL header; the revoked list is located but not read.
    pub fn open(path: &Path) -> Result<CrlFile, CrlError> {
        let file = File::open(path).context(io_ctx(path))?;
        let mut r = CountingReader {
            inner: BufReader::new(file),
            pos: 0,
        };

        let outer = read_tlv_header(&mut r).context(DerSnafu)?;
        ensure!(outer.tag == der::TAG_SEQUENCE, MalformedSnafu {
            what: "CertificateList is not a SEQUENCE",
        });

        let tbs_offset = r.pos;
        let tbs = read_tlv_header(&mut r).context(DerSnafu)?;
        ensure!(tbs.tag == der::TAG_SEQUENCE, MalformedSnafu {
            what: "tbsCertList is not a SEQUENCE",
        });
        let tbs_span = Span {
            offset: tbs_offset,
            len: tbs.total_len() as u64,
        };
        let tbs_end = r.pos + tbs.len as u64;

        // Optional version, then the inner signature AlgorithmIdentifier.
        let mut hdr = read_tlv_header(&mut r).context(DerSnafu)?;
        if hdr.tag == der::TAG_INTEGER {
            r.skip(hdr.len as u64).context(io_ctx(path))?;
            hdr = read_tlv_header(&mut r).context(DerSnafu)?;
        }
        ensure!(hdr.tag == der::TAG_SEQUENCE, MalformedSnafu {
            what: "tbsCertList.signature is not a SEQUENCE",
        });
        r.skip(hdr.len as u64).context(io_ctx(path))?;

        let hdr = read_tlv_header(&mut r).context(DerSnafu)?;
        ensure!(hdr.tag == der::TAG_SEQUENCE, MalformedSnafu {
            what: "CRL issuer is not a SEQUENCE",
        });
        let issuer_raw = read_tlv_body(&mut r, hdr, path)?;
        let issuer_name = super::x509_utils::rfc4519_name(&issuer_raw)?;

        let hdr = read_tlv_header(&mut r).context(DerSnafu)?;
        let this_update = Self::read_time(&mut r, hdr, path)?;

        let mut next_update = None;
        let mut revoked_span = None;
        let mut ext_seq: Option<Vec<u8>> = None;

        let mut pending = Self::next_header(&mut r, tbs_end)?;
        if let Some(h) = pending
            && (h.tag == der::TAG_UTC_TIME || h.tag == der::TAG_GENERALIZED_TIME)
        {
            next_update = Some(Self::read_time(&mut r, h, path)?);
            pending = Self::next_header(&mut r, tbs_end)?;
        }
        if let Some(h) = pending
            && h.tag == der::TAG_SEQUENCE
        {
            revoked_span = Some(Span {
                offset: r.pos,
                len: h.len as u64,
            });
            r.skip(h.len as u64).context(io_ctx(path))?;
            pending = Self::next_header(&mut r, tbs_end)?;
        }
        if let Some(h) = pending {
            ensure!(h.tag == 0xA0, MalformedSnafu {
                what: "unexpected element after revokedCertificates",
            });
            ext_seq = Some(read_exact_vec(&mut r, h.len, path)?);
        }
        ensure!(r.pos == tbs_end, MalformedSnafu {
            what: "trailing bytes inside tbsCertList",
        });

        // Outer signatureAlgorithm and signatureValue.
        let hdr = read_tlv_header(&mut r).context(DerSnafu)?;
        ensure!(hdr.tag == der::TAG_SEQUENCE, MalformedSnafu {
            what: "signatureAlgorithm is not a SEQUENCE",
        });
        let alg_content = read_exact_vec(&mut r, hdr.len, path)?;
        let mut alg_cursor = DerCursor::new(&alg_content);
        let sig_alg_oid = alg_cursor
            .expect(der::TAG_OID)
            .context(DerSnafu)?
            .to_vec();

        let hdr = read_tlv_header(&mut r).context(DerSnafu)?;
        ensure!(hdr.tag == der::TAG_BIT_STRING, MalformedSnafu {
            what: "signatureValue is not a BIT STRING",
        });
        let sig_content = read_exact_vec(&mut r, hdr.len, path)?;
        ensure!(
            sig_content.first() == Some(&0),
            MalformedSnafu {
                what: "signatureValue has unused bits",
            }
        );
        let signature = sig_content[1..].to_vec();

        let extensions = match ext_seq {
            Some(bytes) => Self::parse_extensions(&bytes)?,
            None => Vec::new(),
        };

        let crl_number = extensions
            .iter()
            .find(|e| e.oid == oids::CRL_NUMBER.as_bytes())
            .map(|e| parse_integer_extension(&e.value))
            .transpose()?
            .context(MissingCrlNumberSnafu)?;
        let base_crl_number = extensions
            .iter()
            .find(|e| e.oid == oids::DELTA_CRL_INDICATOR.as_bytes())
            .map(|e| parse_integer_extension(&e.value))
            .transpose()?;

        Ok(CrlFile {
            path: path.to_path_buf(),
            issuer_raw,
            issuer_name,
            this_update,
            next_update,
            sig_alg_oid,
            signature,
            tbs_span,
            revoked_span,
            crl_number,
            base_crl_number,
            extensions,
        })
    }

    fn next_header(
        r: &mut CountingReader<BufReader<File>>,
        end: u64,
    ) -> Result<Option<TlvHeader>, CrlError> {
        if r.pos < end {
            Ok(Some(read_tlv_header(r).context(DerSnafu)?))
        } else {
            Ok(None)
        }
    }

    fn read_time(
        r: &mut CountingReader<BufReader<File>>,
        hdr: TlvHeader,
        path: &Path,
    ) -> Result<i64, CrlError> {
        let content = read_exact_vec(r, hdr.len, path)?;
        der::parse_time_content(hdr.tag, &content).context(DerSnafu)
    }

    fn parse_extensions(content: &[u8]) -> Result<Vec<RawExtension>, CrlError> {
        let mut outer = DerCursor::new(content);
        let seq = outer.expect(der::TAG_SEQUENCE).context(DerSnafu)?;
        let mut cursor = DerCursor::new(seq);
        let mut out = Vec::new();
        while !cursor.is_empty() {
            let ext = cursor.expect(der::TAG_SEQUENCE).context(DerSnafu)?;
            let mut inner = DerCursor::new(ext);
            let oid = inner.expect(der::TAG_OID).context(DerSnafu)?.to_vec();
            let mut critical = false;
            if inner.peek_tag() == Some(der::TAG_BOOLEAN) {
                let b = inner.expect(der::TAG_BOOLEAN).context(DerSnafu)?;
                critical = b.first().copied().unwrap_or(0) != 0;
            }
            let value = inner
                .expect(der::TAG_OCTET_STRING)
                .context(DerSnafu)?
                .to_vec();
            out.push(RawExtension {
                oid,
                critical,
                value,
            });
        }
        Ok(out)
    }

    /// Raw DER of the issuer `Name`.
    pub fn issuer_raw(&self) -> &[u8] {
        &self.issuer_raw
    }

    /// Issuer in RFC 4519 string form.
    pub fn issuer_name(&self) -> &str {
        &self.issuer_name
    }

    pub fn this_update(&self) -> i64 {
        self.this_update
    }

    pub fn next_update(&self) -> Option<i64> {
        self.next_update
    }

    pub fn crl_number(&self) -> u128 {
        self.crl_number
    }

    pub fn base_crl_number(&self) -> Option<u128> {
        self.base_crl_number
    }

    pub fn is_delta_crl(&self) -> bool {
        self.base_crl_number.is_some()
    }

    pub fn crl_extensions(&self) -> &[RawExtension] {
        &self.extensions
    }

    /// Find a CRL-level extension by OID content octets.
    pub fn extension(&self, oid: &[u8]) -> Option<&RawExtension> {
        self.extensions.iter().find(|e| e.oid == oid)
    }

    /// Verify the CRL signature against a DER SubjectPublicKeyInfo,
    /// streaming the TBS bytes from disk. `Ok(false)` means the signature
    /// does not match; errors mean the check could not be performed.
    pub fn verify_signature(&self, spki_der: &[u8]) -> Result<bool, CrlError> {
        let pkey = PKey::public_key_from_der(spki_der).context(SignatureCheckSnafu)?;
        let oid = der::oid_to_string(&self.sig_alg_oid);

        let digest = if self.sig_alg_oid == oids::ED25519.as_bytes() {
            None
        } else if self.sig_alg_oid == oids::RSA_WITH_SHA1.as_bytes()
            || self.sig_alg_oid == oids::ECDSA_WITH_SHA1.as_bytes()
        {
            Some(MessageDigest::sha1())
        } else if self.sig_alg_oid == oids::RSA_WITH_SHA224.as_bytes()
            || self.sig_alg_oid == oids::ECDSA_WITH_SHA224.as_bytes()
        {
            Some(MessageDigest::sha224())
        } else if self.sig_alg_oid == oids::RSA_WITH_SHA256.as_bytes()
            || self.sig_alg_oid == oids::ECDSA_WITH_SHA256.as_bytes()
        {
            Some(MessageDigest::sha256())
        } else if self.sig_alg_oid == oids::RSA_WITH_SHA384.as_bytes()
            || self.sig_alg_oid == oids::ECDSA_WITH_SHA384.as_bytes()
        {
            Some(MessageDigest::sha384())
        } else if self.sig_alg_oid == oids::RSA_WITH_SHA512.as_bytes()
            || self.sig_alg_oid == oids::ECDSA_WITH_SHA512.as_bytes()
        {
            Some(MessageDigest::sha512())
        } else {
            return UnsupportedSignatureAlgorithmSnafu { oid }.fail();
        };

        let mut tbs = TbsReader::open(&self.path, self.tbs_span)?;
        match digest {
            Some(md) => {
                let mut verifier = Verifier::new(md, &pkey).context(SignatureCheckSnafu)?;
                let mut chunk = [0u8; 64 * 1024];
                loop {
                    let n = tbs.read(&mut chunk).context(io_ctx(&self.path))?;
                    if n == 0 {
                        break;
                    }
                    verifier.update(&chunk[..n]).context(SignatureCheckSnafu)?;
                }
                verifier
                    .verify(&self.signature)
                    .context(SignatureCheckSnafu)
            }
            None => {
                // PureEdDSA has no prehash form; the TBS must be read whole.
                let mut buf = Vec::with_capacity(self.tbs_span.len as usize);
                tbs.read_to_end(&mut buf).context(io_ctx(&self.path))?;
                let mut verifier =
                    Verifier::new_without_digest(&pkey).context(SignatureCheckSnafu)?;
                verifier
                    .verify_oneshot(&self.signature, &buf)
                    .context(SignatureCheckSnafu)
            }
        }
    }

    /// Lazy, single-pass iterator over the revoked entries. Each call
    /// reopens the file at the recorded list offset; the previous iterator
    /// releases its handle when dropped.
    pub fn revoked_certificates(&self) -> Result<RevokedEntries, CrlError> {
        let (offset, len) = match self.revoked_span {
            Some(span) => (span.offset, span.len),
            None => (0, 0),
        };
        let reader = if len > 0 {
            let file = File::open(&self.path).context(io_ctx(&self.path))?;
            let mut reader = BufReader::new(file);
            reader
                .seek(SeekFrom::Start(offset))
                .context(io_ctx(&self.path))?;
            Some(reader)
        } else {
            None
        };
        Ok(RevokedEntries {
            reader,
            remaining: len,
            path: self.path.clone(),
            buf: Vec::new(),
        })
    }
}

/// Bounded reader over the TBS span, used for signature verification.
struct TbsReader {
    inner: BufReader<File>,
    remaining: u64,
}

impl TbsReader {
    fn open(path: &Path, span: Span) -> Result<TbsReader, CrlError> {
        let file = File::open(path).context(io_ctx(path))?;
        let mut inner = BufReader::new(file);
        inner
            .seek(SeekFrom::Start(span.offset))
            .context(io_ctx(path))?;
        Ok(TbsReader {
            inner,
            remaining: span.len,
        })
    }
}

impl Read for TbsReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let cap = buf.len().min(self.remaining as usize);
        let n = self.inner.read(&mut buf[..cap])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Single-pass revoked-entry stream.
pub struct RevokedEntries {
    reader: Option<BufReader<File>>,
    remaining: u64,
    path: PathBuf,
    buf: Vec<u8>,
}

impl RevokedEntries {
    fn next_entry(&mut self) -> Result<Option<RevokedEntry>, CrlError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let reader = match self.reader.as_mut() {
            Some(r) => r,
            None => return Ok(None),
        };
        let hdr = read_tlv_header(reader).context(DerSnafu)?;
        ensure!(hdr.tag == der::TAG_SEQUENCE, MalformedSnafu {
            what: "revoked entry is not a SEQUENCE",
        });
        ensure!(
            hdr.total_len() as u64 <= self.remaining,
            MalformedSnafu {
                what: "revoked entry overruns its list",
            }
        );
        self.buf.clear();
        self.buf.push(hdr.tag);
        der::write_len(hdr.len, &mut self.buf);
        let start = self.buf.len();
        self.buf.resize(start + hdr.len, 0);
        reader.read_exact(&mut self.buf[start..]).context(IoSnafu {
            path: self.path.display().to_string(),
        })?;
        self.remaining -= hdr.total_len() as u64;

        let (_, revoked) = RevokedCertificate::from_der(&self.buf).context(EntryParseSnafu)?;
        let reason = match revoked.reason_code() {
            Some((_, code)) => CrlReason::from_code(code.0 as u32)
                .ok_or_else(|| malformed("unknown CRL entry reason code"))?,
            None => CrlReason::Unspecified,
        };
        let invalidity_date = revoked
            .invalidity_date()
            .map(|(_, t)| t.to_datetime().unix_timestamp());
        let certificate_issuer = revoked
            .extensions()
            .iter()
            .find(|ext| ext.oid.as_bytes() == oids::CERTIFICATE_ISSUER.as_bytes())
            .and_then(|ext| parse_certificate_issuer(ext.value));

        Ok(Some(RevokedEntry {
            serial_hex: revoked.serial().to_str_radix(16),
            revocation_date: revoked.revocation_date.to_datetime().unix_timestamp(),
            invalidity_date,
            reason,
            certificate_issuer,
        }))
    }
}

impl Iterator for RevokedEntries {
    type Item = Result<RevokedEntry, CrlError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                // Poison the stream so a caller that keeps polling stops.
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support as th;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parses_header_of_empty_crl() {
        th::test_setup();
        let ca = th::make_ca("Stream Root");
        let this_update = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let crl = th::CrlBuilder::new(&ca, 1)
            .this_update(this_update)
            .next_update(Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap())
            .build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.crl");
        std::fs::write(&path, &crl).unwrap();

        let parsed = CrlFile::open(&path).unwrap();
        assert_eq!(parsed.crl_number(), 1);
        assert!(!parsed.is_delta_crl());
        assert_eq!(parsed.this_update(), this_update.timestamp());
        assert_eq!(
            parsed.next_update(),
            Some(Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap().timestamp())
        );
        assert_eq!(parsed.issuer_raw(), th::subject_der(&ca.cert).as_slice());
        assert_eq!(parsed.issuer_name(), "CN=Stream Root");
        assert!(parsed.revoked_certificates().unwrap().next().is_none());
        assert!(
            parsed
                .crl_extensions()
                .iter()
                .any(|ext| ext.oid_string() == "2.5.29.20")
        );
    }

    #[test]
    fn streams_revoked_entries_with_extensions() {
        th::test_setup();
        let ca = th::make_ca("Stream Entries");
        let rev_date = Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap();
        let inv_date = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let crl = th::CrlBuilder::new(&ca, 7)
            .entry(th::EntrySpec::new(0xDEADBEEFu128, rev_date).reason(1).invalidity(inv_date))
            .entry(th::EntrySpec::new(0x02u128, rev_date))
            .build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.crl");
        std::fs::write(&path, &crl).unwrap();

        let parsed = CrlFile::open(&path).unwrap();
        let entries: Vec<_> = parsed
            .revoked_certificates()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].serial_hex, "deadbeef");
        assert_eq!(entries[0].revocation_date, rev_date.timestamp());
        assert_eq!(entries[0].reason, CrlReason::KeyCompromise);
        assert_eq!(entries[0].invalidity_date, Some(inv_date.timestamp()));
        assert_eq!(entries[1].serial_hex, "2");
        assert_eq!(entries[1].reason, CrlReason::Unspecified);
        assert!(entries[1].certificate_issuer.is_none());
    }

    #[test]
    fn delta_indicator_is_detected() {
        th::test_setup();
        let ca = th::make_ca("Stream Delta");
        let crl = th::CrlBuilder::new(&ca, 5).base_crl_number(4).build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delta.crl");
        std::fs::write(&path, &crl).unwrap();

        let parsed = CrlFile::open(&path).unwrap();
        assert!(parsed.is_delta_crl());
        assert_eq!(parsed.base_crl_number(), Some(4));
    }

    #[test]
    fn missing_crl_number_fails_open() {
        th::test_setup();
        let ca = th::make_ca("Stream NoNumber");
        let crl = th::CrlBuilder::new(&ca, 1).omit_crl_number().build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonum.crl");
        std::fs::write(&path, &crl).unwrap();

        let err = CrlFile::open(&path).unwrap_err();
        assert!(matches!(err, CrlError::MissingCrlNumber { .. }));
    }

    #[test]
    fn signature_verifies_only_with_signer_key() {
        th::test_setup();
        let ca = th::make_ca("Stream Sig");
        let other = th::make_ca("Stream Other");
        let crl = th::CrlBuilder::new(&ca, 3).build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sig.crl");
        std::fs::write(&path, &crl).unwrap();

        let parsed = CrlFile::open(&path).unwrap();
        assert!(parsed.verify_signature(&th::spki_der(&ca.cert)).unwrap());
        assert!(!parsed.verify_signature(&th::spki_der(&other.cert)).unwrap());
    }

    #[test]
    fn certificate_issuer_extension_is_surfaced() {
        th::test_setup();
        let ca = th::make_ca("Stream Indirect");
        let other = th::make_ca("Stream Foreign");
        let rev_date = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let crl = th::CrlBuilder::new(&ca, 2)
            .entry(
                th::EntrySpec::new(0x42u128, rev_date)
                    .certificate_issuer(th::subject_der(&other.cert)),
            )
            .build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ind.crl");
        std::fs::write(&path, &crl).unwrap();

        let parsed = CrlFile::open(&path).unwrap();
        let entries: Vec<_> = parsed
            .revoked_certificates()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            entries[0].certificate_issuer.as_deref(),
            Some(th::subject_der(&other.cert).as_slice())
        );
    }

    #[test]
    fn iterator_is_single_pass_until_reopened() {
        th::test_setup();
        let ca = th::make_ca("Stream SinglePass");
        let rev_date = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let crl = th::CrlBuilder::new(&ca, 2)
            .entry(th::EntrySpec::new(0x01u128, rev_date))
            .build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sp.crl");
        std::fs::write(&path, &crl).unwrap();

        let parsed = CrlFile::open(&path).unwrap();
        let mut first = parsed.revoked_certificates().unwrap();
        assert!(first.next().is_some());
        assert!(first.next().is_none());
        assert!(first.next().is_none());

        // A fresh iterator starts over.
        let mut second = parsed.revoked_certificates().unwrap();
        assert!(second.next().is_some());
    }
}
