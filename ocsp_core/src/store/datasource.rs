//! Data-source collaborator over a pooled SQLite database.
//!
//! The import engine only depends on this surface: connection
//! acquisition/return, `get_max`, dialect-aware "first row only" rewriting
//! and the translation of driver errors into [`StoreError`]. Connections go
//! back to the pool when the guard drops, on every path.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use snafu::{IntoError, ResultExt};
use std::path::Path;

use crate::store::error::{PoolSnafu, SqliteSnafu, StoreError};
use crate::store::schema;

pub type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

#[derive(Clone)]
pub struct DataSource {
    pool: Pool<SqliteConnectionManager>,
}

impl DataSource {
    /// Open (creating when absent) a file-backed database.
    pub fn open(path: &Path) -> Result<DataSource, StoreError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().build(manager).context(PoolSnafu)?;
        let ds = DataSource { pool };
        ds.bootstrap()?;
        Ok(ds)
    }

    /// In-memory database for tests and tooling. Restricted to one pooled
    /// connection so every checkout observes the same database.
    pub fn open_in_memory() -> Result<DataSource, StoreError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .context(PoolSnafu)?;
        let ds = DataSource { pool };
        ds.bootstrap()?;
        Ok(ds)
    }

    fn bootstrap(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(schema::DDL).context(SqliteSnafu)
    }

    /// Acquire a connection; it returns to the pool on drop.
    pub fn conn(&self) -> Result<PooledConn, StoreError> {
        self.pool.get().context(PoolSnafu)
    }

    /// Largest value in `table.col`, or 0 for an empty table. Identifiers
    /// are engine-internal constants, never user input.
    pub fn get_max(&self, conn: &Connection, table: &str, col: &str) -> Result<i64, StoreError> {
        debug_assert!(
            table.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
                && col.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        );
        let sql = format!("SELECT MAX({col}) FROM {table}");
        conn.query_row(&sql, [], |row| row.get::<_, Option<i64>>(0))
            .map(|max| max.unwrap_or(0))
            .context(SqliteSnafu)
    }

    /// Rewrite a SELECT so the database returns at most one row. SQLite
    /// dialect; the seam other dialects would hook into.
    pub fn select_first(&self, sql: &str) -> String {
        format!("{sql} LIMIT 1")
    }

    /// Translate a driver error into the stable store taxonomy.
    pub fn translate(e: rusqlite::Error) -> StoreError {
        SqliteSnafu.into_error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_creates_tables() {
        let ds = DataSource::open_in_memory().unwrap();
        let conn = ds.conn().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('ISSUER','CERT')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn get_max_is_zero_on_empty_table_and_tracks_inserts() {
        let ds = DataSource::open_in_memory().unwrap();
        let conn = ds.conn().unwrap();
        assert_eq!(ds.get_max(&conn, "CERT", "ID").unwrap(), 0);
        conn.execute(
            "INSERT INTO ISSUER (ID,SUBJECT,NBEFORE,NAFTER,S1C,CERT,REV_INFO,CRL_INFO) \
             VALUES (1,'CN=t',0,1,'s1c','cert',NULL,'1,,0,,')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO CERT (ID,IID,SN,REV,LUPDATE) VALUES (7,1,'ab',0,0)",
            [],
        )
        .unwrap();
        assert_eq!(ds.get_max(&conn, "CERT", "ID").unwrap(), 7);
    }

    #[test]
    fn select_first_appends_limit_clause() {
        let ds = DataSource::open_in_memory().unwrap();
        assert_eq!(
            ds.select_first(schema::SQL_SELECT_CERT_ID),
            "SELECT ID FROM CERT WHERE IID=? AND SN=? LIMIT 1"
        );
    }

    #[test]
    fn unique_issuer_serial_pair_is_enforced() {
        let ds = DataSource::open_in_memory().unwrap();
        let conn = ds.conn().unwrap();
        conn.execute(
            "INSERT INTO ISSUER (ID,SUBJECT,NBEFORE,NAFTER,S1C,CERT,REV_INFO,CRL_INFO) \
             VALUES (1,'CN=t',0,1,'s1c','cert',NULL,'1,,0,,')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO CERT (ID,IID,SN,REV,LUPDATE) VALUES (1,1,'ff',0,0)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO CERT (ID,IID,SN,REV,LUPDATE) VALUES (2,1,'ff',0,0)",
            [],
        );
        assert!(dup.is_err());
        let translated = DataSource::translate(dup.unwrap_err());
        assert!(matches!(translated, StoreError::Sqlite { .. }));
    }
}
