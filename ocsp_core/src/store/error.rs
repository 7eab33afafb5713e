use snafu::{Location, Snafu};
use std::path::PathBuf;

/// Translated data-source failures.
#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("Failed to acquire a pooled connection"))]
    Pool {
        source: r2d2::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Database statement failed"))]
    Sqlite {
        source: rusqlite::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Stored value in {column} could not be decoded: {value}"))]
    CorruptColumn {
        column: &'static str,
        value: String,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Import-run failure taxonomy. Any of these aborts the whole run; the
/// boolean entry point logs the cause and returns `false`.
#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum ImportError {
    #[snafu(display("Required input file missing: {}", path.display()))]
    InputMissing {
        path: PathBuf,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Malformed input: {what}"))]
    InputMalformed {
        what: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("CRL signature verification failed"))]
    CrlSignatureInvalid {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("CRL has no crlNumber extension"))]
    CrlMissingNumber {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("CRL number {incoming} is not newer than stored {stored}"))]
    CrlNotNewer {
        incoming: u128,
        stored: u128,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Delta CRL received but no full CRL was imported yet"))]
    NeedFullCrlFirst {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Delta CRL base {got} does not match stored base {expected}"))]
    DeltaBaseMismatch {
        expected: u128,
        got: u128,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("CRL entry for serial {serial} names a different issuer"))]
    CrlEntryIssuerMismatch {
        serial: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Certificate-status store failure"))]
    Store {
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("DER encoding failed: {what}"))]
    Encoding {
        what: String,
        #[snafu(implicit)]
        location: Location,
    },
}
