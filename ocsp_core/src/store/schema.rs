//! Canonical SQL for the ISSUER and CERT tables, plus the string codecs for
//! the two encoded ISSUER columns. Dialect differences (here, the "first
//! row only" clause) are applied by the data source, not baked into these
//! strings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use snafu::OptionExt;

use crate::crl::CrlReason;
use crate::store::error::{CorruptColumnSnafu, StoreError};

pub const SQL_INSERT_CERT: &str =
    "INSERT INTO CERT (ID,IID,SN,REV,RR,RT,RIT,LUPDATE,NBEFORE,NAFTER,HASH) VALUES(?,?,?,?,?,?,?,?,?,?,?)";
pub const SQL_UPDATE_CERT: &str = "UPDATE CERT SET LUPDATE=?,NBEFORE=?,NAFTER=?,HASH=? WHERE ID=?";
pub const SQL_INSERT_CERT_REV: &str =
    "INSERT INTO CERT (ID,IID,SN,REV,RR,RT,RIT,LUPDATE) VALUES(?,?,?,?,?,?,?,?)";
pub const SQL_UPDATE_CERT_REV: &str = "UPDATE CERT SET REV=?,RR=?,RT=?,RIT=?,LUPDATE=? WHERE ID=?";
pub const SQL_DELETE_CERT: &str = "DELETE FROM CERT WHERE IID=? AND SN=?";
pub const SQL_SELECT_CERT_ID: &str = "SELECT ID FROM CERT WHERE IID=? AND SN=?";
pub const SQL_SELECT_ISSUER: &str = "SELECT ID,CRL_INFO FROM ISSUER WHERE S1C=?";

pub const SQL_INSERT_ISSUER: &str =
    "INSERT INTO ISSUER (ID,SUBJECT,NBEFORE,NAFTER,S1C,CERT,REV_INFO,CRL_INFO) VALUES(?,?,?,?,?,?,?,?)";
pub const SQL_UPDATE_ISSUER: &str =
    "UPDATE ISSUER SET SUBJECT=?,NBEFORE=?,NAFTER=?,CERT=?,REV_INFO=?,CRL_INFO=? WHERE ID=?";
pub const SQL_SELECT_ISSUER_REV_INFO: &str = "SELECT REV_INFO FROM ISSUER WHERE ID=?";
pub const SQL_SWEEP_CERTS: &str = "DELETE FROM CERT WHERE IID=? AND LUPDATE<?";

/// Bootstrap DDL for the bundled SQLite data source.
pub const DDL: &str = "
CREATE TABLE IF NOT EXISTS ISSUER (
    ID INTEGER PRIMARY KEY,
    SUBJECT TEXT NOT NULL,
    NBEFORE INTEGER NOT NULL,
    NAFTER INTEGER NOT NULL,
    S1C TEXT NOT NULL UNIQUE,
    CERT TEXT NOT NULL,
    REV_INFO TEXT,
    CRL_INFO TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS CERT (
    ID INTEGER PRIMARY KEY,
    IID INTEGER NOT NULL REFERENCES ISSUER(ID),
    SN TEXT NOT NULL,
    REV INTEGER NOT NULL,
    RR INTEGER,
    RT INTEGER,
    RIT INTEGER,
    LUPDATE INTEGER NOT NULL,
    NBEFORE INTEGER,
    NAFTER INTEGER,
    HASH TEXT,
    UNIQUE (IID, SN)
);
";

fn corrupt(column: &'static str, value: &str) -> StoreError {
    CorruptColumnSnafu {
        column,
        value: value.to_string(),
    }
    .build()
}

/// Decoded `ISSUER.CRL_INFO`: the record the monotonicity checks run
/// against, and the source of the `crlID` embedded into responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlInfo {
    pub crl_number: u128,
    pub base_crl_number: Option<u128>,
    pub this_update: i64,
    pub next_update: Option<i64>,
    pub crl_id: Vec<u8>,
}

impl CrlInfo {
    /// `crlNumber,baseCrlNumber?,thisUpdate,nextUpdate?,base64(crlID)`,
    /// with absent optionals encoded as empty slots.
    pub fn encode(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.crl_number,
            self.base_crl_number
                .map(|n| n.to_string())
                .unwrap_or_default(),
            self.this_update,
            self.next_update.map(|t| t.to_string()).unwrap_or_default(),
            BASE64.encode(&self.crl_id),
        )
    }

    pub fn decode(encoded: &str) -> Result<CrlInfo, StoreError> {
        let fields: Vec<&str> = encoded.split(',').collect();
        if fields.len() != 5 {
            return Err(corrupt("CRL_INFO", encoded));
        }
        let parse_u128 = |s: &str| s.parse::<u128>().map_err(|_| corrupt("CRL_INFO", encoded));
        let parse_i64 = |s: &str| s.parse::<i64>().map_err(|_| corrupt("CRL_INFO", encoded));
        Ok(CrlInfo {
            crl_number: parse_u128(fields[0])?,
            base_crl_number: if fields[1].is_empty() {
                None
            } else {
                Some(parse_u128(fields[1])?)
            },
            this_update: parse_i64(fields[2])?,
            next_update: if fields[3].is_empty() {
                None
            } else {
                Some(parse_i64(fields[3])?)
            },
            crl_id: BASE64
                .decode(fields[4])
                .map_err(|_| corrupt("CRL_INFO", encoded))?,
        })
    }
}

/// Decoded revocation descriptor (`ISSUER.REV_INFO` and the CERT
/// revocation columns share this shape).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevInfo {
    pub reason: CrlReason,
    pub revocation_time: i64,
    pub invalidity_time: Option<i64>,
}

impl RevInfo {
    /// `reason,revocationTime[,invalidityTime]`.
    pub fn encode(&self) -> String {
        match self.invalidity_time {
            Some(invalidity) => {
                format!("{},{},{}", self.reason.code(), self.revocation_time, invalidity)
            }
            None => format!("{},{}", self.reason.code(), self.revocation_time),
        }
    }

    pub fn decode(encoded: &str) -> Result<RevInfo, StoreError> {
        let fields: Vec<&str> = encoded.split(',').collect();
        if fields.len() != 2 && fields.len() != 3 {
            return Err(corrupt("REV_INFO", encoded));
        }
        let reason_code = fields[0]
            .parse::<u32>()
            .map_err(|_| corrupt("REV_INFO", encoded))?;
        let reason = CrlReason::from_code(reason_code).context(CorruptColumnSnafu {
            column: "REV_INFO",
            value: encoded.to_string(),
        })?;
        let revocation_time = fields[1]
            .parse::<i64>()
            .map_err(|_| corrupt("REV_INFO", encoded))?;
        let invalidity_time = match fields.get(2) {
            Some(s) => Some(s.parse::<i64>().map_err(|_| corrupt("REV_INFO", encoded))?),
            None => None,
        };
        Ok(RevInfo {
            reason,
            revocation_time,
            invalidity_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crl_info_round_trips_with_and_without_optionals() {
        let full = CrlInfo {
            crl_number: 42,
            base_crl_number: Some(41),
            this_update: 1_700_000_000,
            next_update: Some(1_700_604_800),
            crl_id: vec![0x30, 0x03, 0x02, 0x01, 0x2A],
        };
        assert_eq!(CrlInfo::decode(&full.encode()).unwrap(), full);

        let minimal = CrlInfo {
            crl_number: 1,
            base_crl_number: None,
            this_update: 0,
            next_update: None,
            crl_id: vec![],
        };
        assert_eq!(CrlInfo::decode(&minimal.encode()).unwrap(), minimal);
    }

    #[test]
    fn crl_info_rejects_garbage() {
        assert!(CrlInfo::decode("").is_err());
        assert!(CrlInfo::decode("1,2,3").is_err());
        assert!(CrlInfo::decode("x,,0,,").is_err());
    }

    #[test]
    fn rev_info_round_trips() {
        let with_invalidity = RevInfo {
            reason: CrlReason::KeyCompromise,
            revocation_time: 1_718_452_800,
            invalidity_time: Some(1_718_000_000),
        };
        assert_eq!(with_invalidity.encode(), "1,1718452800,1718000000");
        assert_eq!(
            RevInfo::decode(&with_invalidity.encode()).unwrap(),
            with_invalidity
        );

        let bare = RevInfo {
            reason: CrlReason::Unspecified,
            revocation_time: 100,
            invalidity_time: None,
        };
        assert_eq!(bare.encode(), "0,100");
        assert_eq!(RevInfo::decode("0,100").unwrap(), bare);
    }

    #[test]
    fn rev_info_rejects_unknown_reason() {
        assert!(RevInfo::decode("7,100").is_err());
        assert!(RevInfo::decode("99,100").is_err());
    }
}
