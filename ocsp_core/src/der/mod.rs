//! Minimal DER encode/decode primitives.
//!
//! The write side targets caller-owned buffers at caller-supplied offsets so
//! that hot-path response assembly never allocates; the Vec-building helpers
//! exist for cold paths (template initialization, `crlID` construction). The
//! read side is a definite-length TLV reader shared by the streaming CRL
//! parser and the in-memory extension walkers.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use snafu::{Location, ResultExt, Snafu};
use std::io::Read;

pub mod oids;

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_BIT_STRING: u8 = 0x03;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_ENUMERATED: u8 = 0x0A;
pub const TAG_UTF8_STRING: u8 = 0x0C;
pub const TAG_PRINTABLE_STRING: u8 = 0x13;
pub const TAG_TELETEX_STRING: u8 = 0x14;
pub const TAG_IA5_STRING: u8 = 0x16;
pub const TAG_UTC_TIME: u8 = 0x17;
pub const TAG_GENERALIZED_TIME: u8 = 0x18;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

/// Encoded `GeneralizedTime` TLV width: tag, length, `YYYYMMDDhhmmssZ`.
pub const GENERALIZED_TIME_LEN: usize = 17;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum DerError {
    #[snafu(display("Unexpected end of DER input"))]
    UnexpectedEof {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("I/O error while reading DER"))]
    Io {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Indefinite lengths are not allowed in DER"))]
    IndefiniteLength {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("DER length does not fit in memory"))]
    LengthOverflow {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Multi-byte DER tags are not supported"))]
    UnsupportedTag {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Expected DER tag {expected:#04x}, found {found:#04x}"))]
    UnexpectedTag {
        expected: u8,
        found: u8,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Malformed DER time value"))]
    InvalidTime {
        #[snafu(implicit)]
        location: Location,
    },
}

/// Tag and content length of one TLV, plus the size of its own header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvHeader {
    pub tag: u8,
    pub len: usize,
    pub header_len: usize,
}

impl TlvHeader {
    pub fn total_len(&self) -> usize {
        self.header_len + self.len
    }
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8, DerError> {
    let mut b = [0u8; 1];
    match r.read_exact(&mut b) {
        Ok(()) => Ok(b[0]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => UnexpectedEofSnafu.fail(),
        Err(e) => Err(e).context(IoSnafu),
    }
}

/// Read one TLV header from a byte source. Definite lengths only.
pub fn read_tlv_header<R: Read>(r: &mut R) -> Result<TlvHeader, DerError> {
    let tag = read_u8(r)?;
    if tag & 0x1F == 0x1F {
        return UnsupportedTagSnafu.fail();
    }
    let first = read_u8(r)?;
    if first < 0x80 {
        return Ok(TlvHeader {
            tag,
            len: first as usize,
            header_len: 2,
        });
    }
    if first == 0x80 {
        return IndefiniteLengthSnafu.fail();
    }
    let n = (first & 0x7F) as usize;
    if n > std::mem::size_of::<usize>() {
        return LengthOverflowSnafu.fail();
    }
    let mut len: usize = 0;
    for _ in 0..n {
        len = (len << 8) | read_u8(r)? as usize;
    }
    Ok(TlvHeader {
        tag,
        len,
        header_len: 2 + n,
    })
}

/// Forward-only cursor over an in-memory DER slice.
pub struct DerCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DerCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn read_header(&mut self) -> Result<TlvHeader, DerError> {
        let mut slice = &self.data[self.pos..];
        let hdr = read_tlv_header(&mut slice)?;
        if self.pos + hdr.total_len() > self.data.len() {
            return UnexpectedEofSnafu.fail();
        }
        Ok(hdr)
    }

    /// Next TLV as `(tag, content)`, advancing past it.
    pub fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), DerError> {
        let hdr = self.read_header()?;
        let start = self.pos + hdr.header_len;
        self.pos += hdr.total_len();
        Ok((hdr.tag, &self.data[start..start + hdr.len]))
    }

    /// Next TLV including its header bytes, advancing past it.
    pub fn read_tlv_raw(&mut self) -> Result<(u8, &'a [u8]), DerError> {
        let hdr = self.read_header()?;
        let start = self.pos;
        self.pos += hdr.total_len();
        Ok((hdr.tag, &self.data[start..start + hdr.total_len()]))
    }

    /// Content of the next TLV, which must carry `tag`.
    pub fn expect(&mut self, tag: u8) -> Result<&'a [u8], DerError> {
        let (found, content) = self.read_tlv()?;
        if found != tag {
            return UnexpectedTagSnafu {
                expected: tag,
                found,
            }
            .fail();
        }
        Ok(content)
    }
}

/// Decode OID content octets into the dotted-decimal form.
pub fn oid_to_string(content: &[u8]) -> String {
    let mut arcs: Vec<u128> = Vec::new();
    let mut acc: u128 = 0;
    for &b in content {
        acc = (acc << 7) | (b & 0x7F) as u128;
        if b & 0x80 == 0 {
            arcs.push(acc);
            acc = 0;
        }
    }
    let mut out = String::new();
    if let Some(&first) = arcs.first() {
        let (a, b) = if first < 40 {
            (0, first)
        } else if first < 80 {
            (1, first - 40)
        } else {
            (2, first - 80)
        };
        out.push_str(&a.to_string());
        out.push('.');
        out.push_str(&b.to_string());
        for arc in &arcs[1..] {
            out.push('.');
            out.push_str(&arc.to_string());
        }
    }
    out
}

/// Append a DER definite length.
pub fn write_len(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

/// Build one TLV.
pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    write_len(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

/// Context-specific constructed (explicit) tag around already-encoded DER.
pub fn explicit(tag_no: u8, inner: &[u8]) -> Vec<u8> {
    tlv(0xA0 | tag_no, inner)
}

/// INTEGER TLV from an unsigned big-endian magnitude.
pub fn encode_integer(magnitude: &[u8]) -> Vec<u8> {
    let trimmed: &[u8] = {
        let skip = magnitude.iter().take_while(|&&b| b == 0).count();
        &magnitude[skip..]
    };
    let mut content = Vec::with_capacity(trimmed.len() + 1);
    if trimmed.is_empty() {
        content.push(0);
    } else {
        if trimmed[0] & 0x80 != 0 {
            content.push(0);
        }
        content.extend_from_slice(trimmed);
    }
    tlv(TAG_INTEGER, &content)
}

/// Big-endian magnitude of a `u128`, without leading zero bytes.
pub fn uint_magnitude(v: u128) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    if skip == bytes.len() {
        vec![0]
    } else {
        bytes[skip..].to_vec()
    }
}

fn write_digits(dst: &mut [u8], mut v: u32) {
    for slot in dst.iter_mut().rev() {
        *slot = b'0' + (v % 10) as u8;
        v /= 10;
    }
}

/// Write an encoded `GeneralizedTime` (`0x18 0x0F YYYYMMDDhhmmssZ`, 17 bytes)
/// at `offset` into a caller-owned buffer. UTC, whole seconds, no allocation.
/// An undersized buffer is a programmer error and panics by slice contract.
pub fn write_generalized_time(t: DateTime<Utc>, buf: &mut [u8], offset: usize) {
    let dst = &mut buf[offset..offset + GENERALIZED_TIME_LEN];
    dst[0] = TAG_GENERALIZED_TIME;
    dst[1] = 0x0F;
    debug_assert!((0..=9999).contains(&t.year()));
    write_digits(&mut dst[2..6], t.year() as u32);
    write_digits(&mut dst[6..8], t.month());
    write_digits(&mut dst[8..10], t.day());
    write_digits(&mut dst[10..12], t.hour());
    write_digits(&mut dst[12..14], t.minute());
    write_digits(&mut dst[14..16], t.second());
    dst[16] = b'Z';
}

fn ascii_digits(s: &[u8]) -> Result<u32, DerError> {
    let mut v: u32 = 0;
    for &b in s {
        if !b.is_ascii_digit() {
            return InvalidTimeSnafu.fail();
        }
        v = v * 10 + (b - b'0') as u32;
    }
    Ok(v)
}

/// Parse the content of a DER `UTCTime` or `GeneralizedTime` into epoch
/// seconds. Only the `...Z` whole-second forms RFC 5280 mandates are
/// accepted; UTCTime years follow the RFC 5280 sliding window (50..99 maps
/// to 19xx).
pub fn parse_time_content(tag: u8, content: &[u8]) -> Result<i64, DerError> {
    let (year, rest) = match tag {
        TAG_GENERALIZED_TIME => {
            if content.len() != 15 {
                return InvalidTimeSnafu.fail();
            }
            (ascii_digits(&content[..4])? as i32, &content[4..])
        }
        TAG_UTC_TIME => {
            if content.len() != 13 {
                return InvalidTimeSnafu.fail();
            }
            let yy = ascii_digits(&content[..2])? as i32;
            let year = if yy >= 50 { 1900 + yy } else { 2000 + yy };
            (year, &content[2..])
        }
        _ => return InvalidTimeSnafu.fail(),
    };
    if rest[10] != b'Z' {
        return InvalidTimeSnafu.fail();
    }
    let month = ascii_digits(&rest[..2])?;
    let day = ascii_digits(&rest[2..4])?;
    let hour = ascii_digits(&rest[4..6])?;
    let minute = ascii_digits(&rest[6..8])?;
    let second = ascii_digits(&rest[8..10])?;
    chrono::Utc
        .with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| InvalidTimeSnafu.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generalized_time_is_fixed_width_ascii() {
        let t = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut buf = [0xEEu8; 21];
        write_generalized_time(t, &mut buf, 2);
        assert_eq!(buf[0], 0xEE);
        assert_eq!(buf[1], 0xEE);
        assert_eq!(buf[2], 0x18);
        assert_eq!(buf[3], 0x0F);
        assert_eq!(&buf[4..19], b"20240615120000Z");
        assert_eq!(buf[19], 0xEE);
    }

    #[test]
    fn generalized_time_round_trips_through_parser() {
        let t = Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap();
        let mut buf = [0u8; GENERALIZED_TIME_LEN];
        write_generalized_time(t, &mut buf, 0);
        let parsed = parse_time_content(TAG_GENERALIZED_TIME, &buf[2..]).unwrap();
        assert_eq!(parsed, t.timestamp());
    }

    #[test]
    fn utc_time_sliding_window() {
        // 990101000000Z is 1999, 240101000000Z is 2024.
        let old = parse_time_content(TAG_UTC_TIME, b"990101000000Z").unwrap();
        assert_eq!(
            old,
            Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap().timestamp()
        );
        let new = parse_time_content(TAG_UTC_TIME, b"240101000000Z").unwrap();
        assert_eq!(
            new,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn integer_encoding_handles_sign_bit_and_zero() {
        assert_eq!(encode_integer(&[]), vec![0x02, 0x01, 0x00]);
        assert_eq!(encode_integer(&[0x00, 0x00]), vec![0x02, 0x01, 0x00]);
        assert_eq!(encode_integer(&[0x7F]), vec![0x02, 0x01, 0x7F]);
        assert_eq!(encode_integer(&[0x80]), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(
            encode_integer(&[0x00, 0xDE, 0xAD]),
            vec![0x02, 0x03, 0x00, 0xDE, 0xAD]
        );
    }

    #[test]
    fn long_form_lengths_round_trip() {
        let content = vec![0xAB; 300];
        let encoded = tlv(TAG_OCTET_STRING, &content);
        let mut cursor = DerCursor::new(&encoded);
        let (tag, parsed) = cursor.read_tlv().unwrap();
        assert_eq!(tag, TAG_OCTET_STRING);
        assert_eq!(parsed, &content[..]);
        assert!(cursor.is_empty());
    }

    #[test]
    fn indefinite_length_is_rejected() {
        let mut data: &[u8] = &[0x30, 0x80, 0x00, 0x00];
        let err = read_tlv_header(&mut data).unwrap_err();
        assert!(matches!(err, DerError::IndefiniteLength { .. }));
    }

    #[test]
    fn oid_decoding() {
        // 2.5.29.20 (crlNumber)
        assert_eq!(oid_to_string(&[0x55, 0x1D, 0x14]), "2.5.29.20");
        // 1.3.36.8.3.13 (certHash)
        assert_eq!(oid_to_string(&[0x2B, 0x24, 0x08, 0x03, 0x0D]), "1.3.36.8.3.13");
        // 1.2.840.113549.1.1.11 (sha256WithRSAEncryption)
        assert_eq!(
            oid_to_string(&[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B]),
            "1.2.840.113549.1.1.11"
        );
    }

    #[test]
    fn cursor_expect_reports_wrong_tag() {
        let encoded = tlv(TAG_INTEGER, &[0x05]);
        let mut cursor = DerCursor::new(&encoded);
        let err = cursor.expect(TAG_SEQUENCE).unwrap_err();
        assert!(matches!(
            err,
            DerError::UnexpectedTag {
                expected: TAG_SEQUENCE,
                found: TAG_INTEGER,
                ..
            }
        ));
    }
}
