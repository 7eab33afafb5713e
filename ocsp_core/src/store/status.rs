//! Read path the responder runs against the store the importer populates.

use rusqlite::OptionalExtension;

use crate::crl::CrlReason;
use crate::store::datasource::DataSource;
use crate::store::error::StoreError;
use crate::store::schema::{CrlInfo, RevInfo};

/// Status of one certificate under one issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertStatus {
    /// No row for this serial.
    Unknown,
    Good {
        /// Base64 digest of the DER certificate, absent for serial-only rows.
        hash: Option<String>,
        not_before: i64,
        not_after: i64,
    },
    Revoked {
        reason: CrlReason,
        revocation_time: i64,
        invalidity_time: Option<i64>,
    },
}

/// One ISSUER row, decoded.
#[derive(Debug, Clone)]
pub struct IssuerRecord {
    pub id: i64,
    pub subject: String,
    pub crl_info: CrlInfo,
    pub rev_info: Option<RevInfo>,
    pub cert_b64: String,
}

/// Look up an issuer by the SHA-1 fingerprint of its DER certificate.
pub fn get_issuer(ds: &DataSource, s1c: &str) -> Result<Option<IssuerRecord>, StoreError> {
    let conn = ds.conn()?;
    let sql =
        ds.select_first("SELECT ID,SUBJECT,CRL_INFO,REV_INFO,CERT FROM ISSUER WHERE S1C=?");
    let row = conn
        .query_row(&sql, [s1c], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .optional()
        .map_err(DataSource::translate)?;
    let (id, subject, crl_info_encoded, rev_info_encoded, cert_b64) = match row {
        Some(row) => row,
        None => return Ok(None),
    };
    Ok(Some(IssuerRecord {
        id,
        subject,
        crl_info: CrlInfo::decode(&crl_info_encoded)?,
        rev_info: rev_info_encoded
            .as_deref()
            .map(RevInfo::decode)
            .transpose()?,
        cert_b64,
    }))
}

/// Status for `(issuer id, serial)`; the serial is the lowercase hex of the
/// positive magnitude, exactly as the importer stores it.
pub fn get_status(ds: &DataSource, iid: i64, serial_hex: &str) -> Result<CertStatus, StoreError> {
    let conn = ds.conn()?;
    let sql = ds.select_first(
        "SELECT REV,RR,RT,RIT,NBEFORE,NAFTER,HASH FROM CERT WHERE IID=? AND SN=?",
    );
    let row = conn
        .query_row(&sql, rusqlite::params![iid, serial_hex], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, Option<i64>>(4)?,
                row.get::<_, Option<i64>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })
        .optional()
        .map_err(DataSource::translate)?;

    let (rev, rr, rt, rit, not_before, not_after, hash) = match row {
        Some(row) => row,
        None => return Ok(CertStatus::Unknown),
    };

    if rev != 0 {
        let reason = rr
            .and_then(|code| CrlReason::from_code(code as u32))
            .unwrap_or(CrlReason::Unspecified);
        let revocation_time = rt.unwrap_or_default();
        return Ok(CertStatus::Revoked {
            reason,
            revocation_time,
            invalidity_time: rit,
        });
    }
    Ok(CertStatus::Good {
        hash,
        not_before: not_before.unwrap_or(0),
        not_after: not_after.unwrap_or(i64::MAX),
    })
}
