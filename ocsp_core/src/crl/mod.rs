pub mod error;
pub mod reason;
pub mod stream;
pub mod x509_utils;

pub use error::CrlError;
pub use reason::CrlReason;
pub use stream::{CrlFile, RawExtension, RevokedEntries, RevokedEntry};
