//! CRL import engine.
//!
//! Consumes an operator-provided directory (`ca.crt`, `ca.crl`, optional
//! `issuer.crt`, `crl.url`, `REVOCATION`, `certs/`), verifies the CRL
//! against its signer, reconciles the ISSUER and CERT tables and, for full
//! CRLs, garbage-collects rows the run did not touch. One connection, one
//! statement bundle scoped to the run, per-statement commits; the run is
//! resumable at the CRL-number boundary.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use der_parser::num_bigint::BigUint;
use rusqlite::{Connection, OptionalExtension, params};
use snafu::{ResultExt, ensure};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::ImportConfig;
use crate::crl::error::CrlError;
use crate::crl::{CrlFile, RevokedEntry, x509_utils};
use crate::der::{self, DerCursor, oids};
use crate::hash::HashAlgo;
use crate::store::datasource::DataSource;
use crate::store::error::{
    CrlEntryIssuerMismatchSnafu, CrlMissingNumberSnafu, CrlNotNewerSnafu,
    CrlSignatureInvalidSnafu, DeltaBaseMismatchSnafu, EncodingSnafu, ImportError,
    InputMalformedSnafu, InputMissingSnafu, NeedFullCrlFirstSnafu, StoreError, StoreSnafu,
};
use crate::store::schema::{self, CrlInfo, RevInfo};

const TARGET: &str = "ocsp_core::store";

/// Validity sentinels for rows where only the serial is known.
const SENTINEL_NOT_BEFORE: i64 = 0;
const SENTINEL_NOT_AFTER: i64 = i64::MAX;

pub struct CrlImporter {
    datasource: DataSource,
    config: ImportConfig,
}

/// Everything derived from the CA side of the input directory.
struct CaMaterial {
    ca_der: Vec<u8>,
    subject_raw: Vec<u8>,
    subject: String,
    ski: Option<Vec<u8>>,
    not_before: i64,
    not_after: i64,
    signer_spki: Vec<u8>,
    crl_url: Option<String>,
    rev_info: Option<RevInfo>,
}

/// The five run-scoped prepared statements plus the keyed lookup. Dropping
/// the bundle releases every statement; dropping the connection afterwards
/// returns it to the pool. Both happen on success and on failure.
struct StatementBundle<'c> {
    insert_cert: rusqlite::Statement<'c>,
    update_cert: rusqlite::Statement<'c>,
    insert_cert_rev: rusqlite::Statement<'c>,
    update_cert_rev: rusqlite::Statement<'c>,
    delete_cert: rusqlite::Statement<'c>,
    select_cert_id: rusqlite::Statement<'c>,
}

impl<'c> StatementBundle<'c> {
    fn prepare(conn: &'c Connection, ds: &DataSource) -> Result<StatementBundle<'c>, ImportError> {
        let prepare = |sql: &str| {
            conn.prepare(sql)
                .map_err(DataSource::translate)
                .context(StoreSnafu)
        };
        Ok(StatementBundle {
            insert_cert: prepare(schema::SQL_INSERT_CERT)?,
            update_cert: prepare(schema::SQL_UPDATE_CERT)?,
            insert_cert_rev: prepare(schema::SQL_INSERT_CERT_REV)?,
            update_cert_rev: prepare(schema::SQL_UPDATE_CERT_REV)?,
            delete_cert: prepare(schema::SQL_DELETE_CERT)?,
            select_cert_id: prepare(&ds.select_first(schema::SQL_SELECT_CERT_ID))?,
        })
    }

    fn cert_id(&mut self, iid: i64, sn: &str) -> Result<Option<i64>, ImportError> {
        self.select_cert_id
            .query_row(params![iid, sn], |row| row.get::<_, i64>(0))
            .optional()
            .map_err(DataSource::translate)
            .context(StoreSnafu)
    }
}

/// Explicit write-mode branch for the cert upsert helpers.
enum CertWrite {
    Insert,
    Update(i64),
}

fn input_malformed(what: impl std::fmt::Display) -> ImportError {
    InputMalformedSnafu {
        what: what.to_string(),
    }
    .build()
}

fn serial_hex_from_magnitude(content: &[u8]) -> String {
    BigUint::from_bytes_be(content).to_str_radix(16)
}

fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}

fn parse_properties_time(s: &str) -> Option<i64> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// `CrlID ::= SEQUENCE { [0] IA5String url?, [1] INTEGER crlNumber,
/// [2] GeneralizedTime thisUpdate }`, `[0]` omitted for a blank URL.
/// IA5String content is 7-bit ASCII; anything else cannot be encoded.
fn build_crl_id(
    url: Option<&str>,
    crl_number: u128,
    this_update: i64,
) -> Result<Vec<u8>, ImportError> {
    let mut content = Vec::new();
    if let Some(url) = url {
        let url = url.trim();
        if !url.is_empty() {
            ensure!(url.is_ascii(), EncodingSnafu {
                what: "crl.url is not 7-bit ASCII and cannot become an IA5String",
            });
            content.extend_from_slice(&der::explicit(
                0,
                &der::tlv(der::TAG_IA5_STRING, url.as_bytes()),
            ));
        }
    }
    content.extend_from_slice(&der::explicit(
        1,
        &der::encode_integer(&der::uint_magnitude(crl_number)),
    ));
    let t = DateTime::<Utc>::from_timestamp(this_update, 0).unwrap_or_default();
    let mut gt = [0u8; der::GENERALIZED_TIME_LEN];
    der::write_generalized_time(t, &mut gt, 0);
    content.extend_from_slice(&der::explicit(2, &gt));
    Ok(der::tlv(der::TAG_SEQUENCE, &content))
}

impl CrlImporter {
    pub fn new(datasource: DataSource, config: ImportConfig) -> CrlImporter {
        CrlImporter { datasource, config }
    }

    /// Build an importer from configuration alone, opening the bundled
    /// SQLite data source at `db_path` (in-memory when unset).
    pub fn from_config(config: ImportConfig) -> Result<CrlImporter, StoreError> {
        let datasource = match &config.db_path {
            Some(path) => DataSource::open(path)?,
            None => DataSource::open_in_memory()?,
        };
        Ok(CrlImporter::new(datasource, config))
    }

    /// Import the CRL found in `base_dir`. Returns `true` on success; the
    /// failure cause is logged and available through [`Self::try_import`].
    pub fn import_crl_to_ocsp_db(&self, base_dir: &Path) -> bool {
        match self.try_import(base_dir) {
            Ok(()) => {
                tracing::info!(
                    target: TARGET,
                    dir = %base_dir.display(),
                    "CRL import finished"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    target: TARGET,
                    dir = %base_dir.display(),
                    error = %e,
                    "CRL import failed"
                );
                false
            }
        }
    }

    pub fn try_import(&self, base_dir: &Path) -> Result<(), ImportError> {
        let ca_path = base_dir.join("ca.crt");
        ensure!(ca_path.is_file(), InputMissingSnafu {
            path: ca_path.clone()
        });
        let crl_path = base_dir.join("ca.crl");
        ensure!(crl_path.is_file(), InputMissingSnafu {
            path: crl_path.clone()
        });

        let crl = CrlFile::open(&crl_path).map_err(|e| match e {
            CrlError::MissingCrlNumber { .. } => CrlMissingNumberSnafu.build(),
            other => input_malformed(format_args!("ca.crl: {other}")),
        })?;
        let ca = self.load_ca_material(base_dir, &ca_path, &crl)?;

        // Verify before anything touches the revoked-entry stream.
        match crl.verify_signature(&ca.signer_spki) {
            Ok(true) => {}
            Ok(false) => return CrlSignatureInvalidSnafu.fail(),
            Err(e) => {
                tracing::warn!(target: TARGET, error = %e, "CRL signature check could not run");
                return CrlSignatureInvalidSnafu.fail();
            }
        }

        let is_delta = crl.is_delta_crl();
        let crl_id = build_crl_id(ca.crl_url.as_deref(), crl.crl_number(), crl.this_update())?;
        let crl_info = CrlInfo {
            crl_number: crl.crl_number(),
            base_crl_number: crl.base_crl_number(),
            this_update: crl.this_update(),
            next_update: crl.next_update(),
            crl_id,
        };

        // Captured before the issuer upsert; the post-import sweep compares
        // against this instant.
        let import_start = Utc::now().timestamp();

        let conn = self.datasource.conn().context(StoreSnafu)?;
        let iid = self.upsert_issuer(&conn, &ca, &crl_info, is_delta)?;

        let mut next_cert_id = self
            .datasource
            .get_max(&conn, "CERT", "ID")
            .context(StoreSnafu)?
            + 1;

        {
            let mut stmts = StatementBundle::prepare(&conn, &self.datasource)?;

            let entries = crl
                .revoked_certificates()
                .map_err(|e| input_malformed(format_args!("ca.crl: {e}")))?;
            for entry in entries {
                let entry = entry.map_err(|e| input_malformed(format_args!("ca.crl: {e}")))?;
                self.apply_revoked_entry(
                    &mut stmts,
                    iid,
                    &entry,
                    &ca,
                    is_delta,
                    import_start,
                    &mut next_cert_id,
                )?;
            }

            if let Some(certset) = crl.extension(oids::XIPKI_CRL_CERTSET.as_bytes()) {
                self.import_crl_certset(
                    &mut stmts,
                    iid,
                    &certset.value,
                    &ca,
                    import_start,
                    &mut next_cert_id,
                )?;
            } else {
                let certs_dir = base_dir.join("certs");
                if certs_dir.is_dir() {
                    self.import_certs_dir(
                        &mut stmts,
                        iid,
                        &certs_dir,
                        &ca,
                        import_start,
                        &mut next_cert_id,
                    )?;
                }
            }

            if !is_delta {
                conn.execute(schema::SQL_SWEEP_CERTS, params![iid, import_start])
                    .map_err(DataSource::translate)
                    .context(StoreSnafu)?;
            }
        }

        Ok(())
    }

    fn load_ca_material(
        &self,
        base_dir: &Path,
        ca_path: &Path,
        crl: &CrlFile,
    ) -> Result<CaMaterial, ImportError> {
        let ca_der = x509_utils::load_cert_bytes(ca_path)
            .map_err(|e| input_malformed(format_args!("ca.crt: {e}")))?;
        let ca_cert = x509_utils::parse_cert(&ca_der)
            .map_err(|e| input_malformed(format_args!("ca.crt: {e}")))?;
        let subject_raw = ca_cert.subject().as_raw().to_vec();
        let subject = x509_utils::rfc4519_name(&subject_raw)
            .map_err(|e| input_malformed(format_args!("ca.crt subject: {e}")))?;
        let ski = x509_utils::extract_skid(&ca_cert);
        let (not_before, not_after) = x509_utils::validity_seconds(&ca_cert);

        let signer_spki = if crl.issuer_raw() == subject_raw.as_slice() {
            ca_cert.public_key().raw.to_vec()
        } else {
            // Delegated CRL signer.
            let issuer_path = base_dir.join("issuer.crt");
            ensure!(issuer_path.is_file(), InputMissingSnafu {
                path: issuer_path.clone()
            });
            let issuer_der = x509_utils::load_cert_bytes(&issuer_path)
                .map_err(|e| input_malformed(format_args!("issuer.crt: {e}")))?;
            let issuer_cert = x509_utils::parse_cert(&issuer_der)
                .map_err(|e| input_malformed(format_args!("issuer.crt: {e}")))?;
            ensure!(
                issuer_cert.subject().as_raw() == crl.issuer_raw(),
                InputMalformedSnafu {
                    what: "issuer.crt subject does not match the CRL issuer",
                }
            );
            issuer_cert.public_key().raw.to_vec()
        };

        let url_path = base_dir.join("crl.url");
        let crl_url = if url_path.is_file() {
            let text = std::fs::read_to_string(&url_path)
                .map_err(|e| input_malformed(format_args!("crl.url: {e}")))?;
            let trimmed = text.trim().to_string();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        } else {
            None
        };

        let rev_path = base_dir.join("REVOCATION");
        let rev_info = if rev_path.is_file() {
            let text = std::fs::read_to_string(&rev_path)
                .map_err(|e| input_malformed(format_args!("REVOCATION: {e}")))?;
            let props = parse_properties(&text);
            let revocation_time = props
                .get("ca.revocation.time")
                .and_then(|s| parse_properties_time(s))
                .ok_or_else(|| input_malformed("REVOCATION: bad or missing ca.revocation.time"))?;
            let invalidity_time = match props.get("ca.invalidity.time") {
                Some(s) => Some(
                    parse_properties_time(s)
                        .ok_or_else(|| input_malformed("REVOCATION: bad ca.invalidity.time"))?,
                ),
                None => None,
            };
            Some(RevInfo {
                reason: crate::crl::CrlReason::Unspecified,
                revocation_time,
                invalidity_time,
            })
        } else {
            None
        };

        Ok(CaMaterial {
            ca_der,
            subject_raw,
            subject,
            ski,
            not_before,
            not_after,
            signer_spki,
            crl_url,
            rev_info,
        })
    }

    /// Step 5: ISSUER row keyed by the SHA-1 fingerprint of the CA cert.
    fn upsert_issuer(
        &self,
        conn: &Connection,
        ca: &CaMaterial,
        crl_info: &CrlInfo,
        is_delta: bool,
    ) -> Result<i64, ImportError> {
        let s1c = HashAlgo::Sha1.base64_hash(&ca.ca_der);
        let select = self.datasource.select_first(schema::SQL_SELECT_ISSUER);
        let existing = conn
            .query_row(&select, params![s1c], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .optional()
            .map_err(DataSource::translate)
            .context(StoreSnafu)?;

        let cert_b64 = BASE64.encode(&ca.ca_der);
        let fresh_rev_info = ca.rev_info.map(|r| r.encode());

        match existing {
            Some((id, stored_encoded)) => {
                let stored = CrlInfo::decode(&stored_encoded).context(StoreSnafu)?;
                ensure!(crl_info.crl_number > stored.crl_number, CrlNotNewerSnafu {
                    incoming: crl_info.crl_number,
                    stored: stored.crl_number,
                });
                if is_delta {
                    let expected = stored.base_crl_number.unwrap_or(stored.crl_number);
                    let got = crl_info.base_crl_number.unwrap_or_default();
                    ensure!(got == expected, DeltaBaseMismatchSnafu { expected, got });
                }
                // A refresh without a REVOCATION file keeps the recorded CA
                // revocation; this engine never clears it.
                let rev_info = match fresh_rev_info {
                    Some(encoded) => Some(encoded),
                    None => self.stored_issuer_rev_info(conn, id)?,
                };
                conn.execute(
                    schema::SQL_UPDATE_ISSUER,
                    params![
                        ca.subject,
                        ca.not_before,
                        ca.not_after,
                        cert_b64,
                        rev_info,
                        crl_info.encode(),
                        id
                    ],
                )
                .map_err(DataSource::translate)
                .context(StoreSnafu)?;
                tracing::debug!(
                    target: TARGET,
                    issuer = %ca.subject,
                    crl_number = %crl_info.crl_number,
                    "updated ISSUER row"
                );
                Ok(id)
            }
            None => {
                ensure!(!is_delta, NeedFullCrlFirstSnafu);
                let id = self
                    .datasource
                    .get_max(conn, "ISSUER", "ID")
                    .context(StoreSnafu)?
                    + 1;
                conn.execute(
                    schema::SQL_INSERT_ISSUER,
                    params![
                        id,
                        ca.subject,
                        ca.not_before,
                        ca.not_after,
                        s1c,
                        cert_b64,
                        fresh_rev_info,
                        crl_info.encode()
                    ],
                )
                .map_err(DataSource::translate)
                .context(StoreSnafu)?;
                tracing::info!(
                    target: TARGET,
                    issuer = %ca.subject,
                    crl_number = %crl_info.crl_number,
                    "inserted ISSUER row"
                );
                Ok(id)
            }
        }
    }

    fn stored_issuer_rev_info(
        &self,
        conn: &Connection,
        id: i64,
    ) -> Result<Option<String>, ImportError> {
        let select = self
            .datasource
            .select_first(schema::SQL_SELECT_ISSUER_REV_INFO);
        conn.query_row(&select, params![id], |row| row.get::<_, Option<String>>(0))
            .optional()
            .map(Option::flatten)
            .map_err(DataSource::translate)
            .context(StoreSnafu)
    }

    /// Step 6: one revoked entry from the stream.
    fn apply_revoked_entry(
        &self,
        stmts: &mut StatementBundle<'_>,
        iid: i64,
        entry: &RevokedEntry,
        ca: &CaMaterial,
        is_delta: bool,
        import_start: i64,
        next_cert_id: &mut i64,
    ) -> Result<(), ImportError> {
        if let Some(entry_issuer) = &entry.certificate_issuer
            && entry_issuer.as_slice() != ca.subject_raw.as_slice()
        {
            return CrlEntryIssuerMismatchSnafu {
                serial: entry.serial_hex.clone(),
            }
            .fail();
        }

        if entry.reason.is_remove_from_crl() {
            if is_delta {
                stmts
                    .delete_cert
                    .execute(params![iid, entry.serial_hex])
                    .map_err(DataSource::translate)
                    .context(StoreSnafu)?;
                tracing::debug!(
                    target: TARGET,
                    serial = %entry.serial_hex,
                    "removed certificate per removeFromCRL"
                );
            } else {
                // Deleting on a full CRL would amplify an issuer-side
                // inconsistency into the status table.
                tracing::warn!(
                    target: TARGET,
                    serial = %entry.serial_hex,
                    "ignoring removeFromCRL entry in a full CRL"
                );
            }
            return Ok(());
        }

        let write = match stmts.cert_id(iid, &entry.serial_hex)? {
            Some(id) => CertWrite::Update(id),
            None => CertWrite::Insert,
        };
        let rr = entry.reason.code() as i64;
        match write {
            CertWrite::Update(id) => {
                stmts
                    .update_cert_rev
                    .execute(params![
                        1i64,
                        rr,
                        entry.revocation_date,
                        entry.invalidity_date,
                        import_start,
                        id
                    ])
                    .map_err(DataSource::translate)
                    .context(StoreSnafu)?;
            }
            CertWrite::Insert => {
                let id = *next_cert_id;
                *next_cert_id += 1;
                stmts
                    .insert_cert_rev
                    .execute(params![
                        id,
                        iid,
                        entry.serial_hex,
                        1i64,
                        rr,
                        entry.revocation_date,
                        entry.invalidity_date,
                        import_start
                    ])
                    .map_err(DataSource::translate)
                    .context(StoreSnafu)?;
            }
        }
        Ok(())
    }

    /// AKI admission rule for companion certificate material.
    fn admit_cert(&self, cert: &x509_parser::certificate::X509Certificate<'_>, ca: &CaMaterial) -> bool {
        match (x509_utils::extract_akid(cert), &ca.ski) {
            (Some(aki), Some(ski)) if aki == *ski => true,
            (Some(_), _) => false,
            (None, _) => true,
        }
    }

    fn upsert_cert_with_metadata(
        &self,
        stmts: &mut StatementBundle<'_>,
        iid: i64,
        cert_der: &[u8],
        sn: &str,
        not_before: i64,
        not_after: i64,
        import_start: i64,
        next_cert_id: &mut i64,
    ) -> Result<(), ImportError> {
        let hash = self.config.cert_hash_algo.base64_hash(cert_der);
        let write = match stmts.cert_id(iid, sn)? {
            Some(id) => CertWrite::Update(id),
            None => CertWrite::Insert,
        };
        match write {
            CertWrite::Update(id) => {
                stmts
                    .update_cert
                    .execute(params![import_start, not_before, not_after, hash, id])
                    .map_err(DataSource::translate)
                    .context(StoreSnafu)?;
            }
            CertWrite::Insert => {
                let id = *next_cert_id;
                *next_cert_id += 1;
                stmts
                    .insert_cert
                    .execute(params![
                        id,
                        iid,
                        sn,
                        0i64,
                        None::<i64>,
                        None::<i64>,
                        None::<i64>,
                        import_start,
                        not_before,
                        not_after,
                        hash
                    ])
                    .map_err(DataSource::translate)
                    .context(StoreSnafu)?;
            }
        }
        Ok(())
    }

    fn upsert_serial_only(
        &self,
        stmts: &mut StatementBundle<'_>,
        iid: i64,
        sn: &str,
        import_start: i64,
        next_cert_id: &mut i64,
    ) -> Result<(), ImportError> {
        let write = match stmts.cert_id(iid, sn)? {
            Some(id) => CertWrite::Update(id),
            None => CertWrite::Insert,
        };
        match write {
            CertWrite::Update(id) => {
                stmts
                    .update_cert
                    .execute(params![
                        import_start,
                        SENTINEL_NOT_BEFORE,
                        SENTINEL_NOT_AFTER,
                        None::<String>,
                        id
                    ])
                    .map_err(DataSource::translate)
                    .context(StoreSnafu)?;
            }
            CertWrite::Insert => {
                let id = *next_cert_id;
                *next_cert_id += 1;
                stmts
                    .insert_cert
                    .execute(params![
                        id,
                        iid,
                        sn,
                        0i64,
                        None::<i64>,
                        None::<i64>,
                        None::<i64>,
                        import_start,
                        SENTINEL_NOT_BEFORE,
                        SENTINEL_NOT_AFTER,
                        None::<String>
                    ])
                    .map_err(DataSource::translate)
                    .context(StoreSnafu)?;
            }
        }
        Ok(())
    }

    /// One embedded certificate: sanity checks, admission, then upsert.
    fn ingest_companion_cert(
        &self,
        stmts: &mut StatementBundle<'_>,
        iid: i64,
        cert_der: &[u8],
        expected_serial_hex: Option<&str>,
        ca: &CaMaterial,
        import_start: i64,
        next_cert_id: &mut i64,
        origin: &str,
    ) -> Result<(), ImportError> {
        let cert = match x509_utils::parse_cert(cert_der) {
            Ok(cert) => cert,
            Err(e) => {
                tracing::warn!(target: TARGET, origin, error = %e, "skipping unparseable certificate");
                return Ok(());
            }
        };
        if cert.issuer().as_raw() != ca.subject_raw.as_slice() {
            tracing::warn!(target: TARGET, origin, "skipping certificate with foreign issuer");
            return Ok(());
        }
        let sn = x509_utils::serial_hex(&cert);
        if let Some(expected) = expected_serial_hex
            && sn != expected
        {
            tracing::warn!(
                target: TARGET,
                origin,
                serial = %sn,
                expected,
                "skipping certificate whose serial does not match its entry"
            );
            return Ok(());
        }
        if !self.admit_cert(&cert, ca) {
            tracing::warn!(
                target: TARGET,
                origin,
                serial = %sn,
                "skipping certificate whose AKI does not match the CA SKI"
            );
            return Ok(());
        }
        let (not_before, not_after) = x509_utils::validity_seconds(&cert);
        self.upsert_cert_with_metadata(
            stmts,
            iid,
            cert_der,
            &sn,
            not_before,
            not_after,
            import_start,
            next_cert_id,
        )
    }

    /// Step 7a: the proprietary in-CRL certificate set.
    /// `SET OF SEQUENCE { serialNumber INTEGER, [0] Certificate OPTIONAL,
    /// [1] UTF8String profileName OPTIONAL }`.
    fn import_crl_certset(
        &self,
        stmts: &mut StatementBundle<'_>,
        iid: i64,
        value: &[u8],
        ca: &CaMaterial,
        import_start: i64,
        next_cert_id: &mut i64,
    ) -> Result<(), ImportError> {
        let mut outer = DerCursor::new(value);
        let set = outer
            .expect(der::TAG_SET)
            .map_err(|e| input_malformed(format_args!("crlCertset: {e}")))?;
        let mut cursor = DerCursor::new(set);
        while !cursor.is_empty() {
            let entry = cursor
                .expect(der::TAG_SEQUENCE)
                .map_err(|e| input_malformed(format_args!("crlCertset: {e}")))?;
            let mut fields = DerCursor::new(entry);
            let serial_content = fields
                .expect(der::TAG_INTEGER)
                .map_err(|e| input_malformed(format_args!("crlCertset serial: {e}")))?;
            let sn = serial_hex_from_magnitude(serial_content);

            let mut cert_der: Option<&[u8]> = None;
            if fields.peek_tag() == Some(0xA0) {
                let wrapped = fields
                    .expect(0xA0)
                    .map_err(|e| input_malformed(format_args!("crlCertset cert: {e}")))?;
                let mut inner = DerCursor::new(wrapped);
                let (_, raw) = inner
                    .read_tlv_raw()
                    .map_err(|e| input_malformed(format_args!("crlCertset cert: {e}")))?;
                cert_der = Some(raw);
            }
            if fields.peek_tag() == Some(0xA1) {
                // profileName is carried for operator tooling only.
                let wrapped = fields
                    .expect(0xA1)
                    .map_err(|e| input_malformed(format_args!("crlCertset profile: {e}")))?;
                let mut inner = DerCursor::new(wrapped);
                if let Ok(profile) = inner.expect(der::TAG_UTF8_STRING) {
                    tracing::debug!(
                        target: TARGET,
                        serial = %sn,
                        profile = %String::from_utf8_lossy(profile),
                        "crlCertset profile"
                    );
                }
            }

            match cert_der {
                Some(der_bytes) => self.ingest_companion_cert(
                    stmts,
                    iid,
                    der_bytes,
                    Some(&sn),
                    ca,
                    import_start,
                    next_cert_id,
                    "crlCertset",
                )?,
                None => self.upsert_serial_only(stmts, iid, &sn, import_start, next_cert_id)?,
            }
        }
        Ok(())
    }

    /// Step 7b: companion material from `certs/`. Certificate files first,
    /// then `.serials` lists, both in sorted name order.
    fn import_certs_dir(
        &self,
        stmts: &mut StatementBundle<'_>,
        iid: i64,
        dir: &Path,
        ca: &CaMaterial,
        import_start: i64,
        next_cert_id: &mut i64,
    ) -> Result<(), ImportError> {
        let mut paths: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .collect(),
            Err(e) => {
                tracing::warn!(target: TARGET, dir = %dir.display(), error = %e, "certs directory not readable");
                return Ok(());
            }
        };
        paths.sort();

        let ext_of = |p: &Path| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
        };

        for path in paths
            .iter()
            .filter(|p| matches!(ext_of(p).as_deref(), Some("der" | "crt" | "pem")))
        {
            let raw = match std::fs::read(path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(target: TARGET, file = %path.display(), error = %e, "skipping unreadable certificate file");
                    continue;
                }
            };
            let der_bytes = match x509_utils::to_der(raw) {
                Ok(der_bytes) => der_bytes,
                Err(e) => {
                    tracing::warn!(target: TARGET, file = %path.display(), error = %e, "skipping unparseable certificate file");
                    continue;
                }
            };
            self.ingest_companion_cert(
                stmts,
                iid,
                &der_bytes,
                None,
                ca,
                import_start,
                next_cert_id,
                "certs/",
            )?;
        }

        for path in paths
            .iter()
            .filter(|p| ext_of(p).as_deref() == Some("serials"))
        {
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(target: TARGET, file = %path.display(), error = %e, "skipping unreadable serials file");
                    continue;
                }
            };
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let sn = match BigUint::parse_bytes(line.as_bytes(), 16) {
                    Some(serial) => serial.to_str_radix(16),
                    None => {
                        tracing::warn!(target: TARGET, file = %path.display(), line, "skipping unparseable serial");
                        continue;
                    }
                };
                self.upsert_serial_only(stmts, iid, &sn, import_start, next_cert_id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn properties_parsing_ignores_comments_and_blank_lines() {
        let props = parse_properties(
            "# header\n\nca.revocation.time=20240102030405\n  ca.invalidity.time = 20231231235959  \n",
        );
        assert_eq!(
            props.get("ca.revocation.time").map(String::as_str),
            Some("20240102030405")
        );
        assert_eq!(
            props.get("ca.invalidity.time").map(String::as_str),
            Some("20231231235959")
        );
    }

    #[test]
    fn properties_time_is_strict_utc() {
        let t = parse_properties_time("20240102030405").unwrap();
        assert_eq!(
            t,
            chrono::Utc
                .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
                .unwrap()
                .timestamp()
        );
        assert!(parse_properties_time("2024-01-02 03:04:05").is_none());
        assert!(parse_properties_time("20240102").is_none());
    }

    #[test]
    fn crl_id_layout_with_and_without_url() {
        use crate::der::{DerCursor, TAG_SEQUENCE};

        let with_url = build_crl_id(Some("http://crl.example/ca.crl"), 7, 1_700_000_000).unwrap();
        let mut outer = DerCursor::new(&with_url);
        let content = outer.expect(TAG_SEQUENCE).unwrap();
        let mut cursor = DerCursor::new(content);
        let (tag, url) = cursor.read_tlv().unwrap();
        assert_eq!(tag, 0xA0);
        let mut url_cursor = DerCursor::new(url);
        assert_eq!(
            url_cursor.expect(crate::der::TAG_IA5_STRING).unwrap(),
            b"http://crl.example/ca.crl"
        );
        let (tag, _) = cursor.read_tlv().unwrap();
        assert_eq!(tag, 0xA1);
        let (tag, _) = cursor.read_tlv().unwrap();
        assert_eq!(tag, 0xA2);
        assert!(cursor.is_empty());

        // Blank URL: the [0] element is omitted entirely.
        let without = build_crl_id(Some("   "), 7, 1_700_000_000).unwrap();
        let mut outer = DerCursor::new(&without);
        let content = outer.expect(TAG_SEQUENCE).unwrap();
        let mut cursor = DerCursor::new(content);
        let (tag, _) = cursor.read_tlv().unwrap();
        assert_eq!(tag, 0xA1);
    }

    #[test]
    fn crl_id_rejects_non_ascii_url() {
        let err = build_crl_id(Some("http://crl.exämple/ca.crl"), 7, 1_700_000_000).unwrap_err();
        assert!(matches!(err, ImportError::Encoding { .. }));
    }

    #[test]
    fn magnitude_serials_drop_leading_zeroes() {
        assert_eq!(serial_hex_from_magnitude(&[0x00, 0xDE, 0xAD]), "dead");
        assert_eq!(serial_hex_from_magnitude(&[0x01]), "1");
        assert_eq!(serial_hex_from_magnitude(&[0x00]), "0");
    }
}
