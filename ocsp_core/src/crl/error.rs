use snafu::{Location, Snafu};

use crate::der::DerError;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum CrlError {
    #[snafu(display("Failed to read {path}"))]
    Io {
        path: String,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Malformed DER in CRL"))]
    Der {
        source: DerError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Malformed CRL: {what}"))]
    Malformed {
        what: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("CRL has no crlNumber extension"))]
    MissingCrlNumber {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("CRL number does not fit in 16 bytes"))]
    CrlNumberRange {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to parse CRL entry"))]
    EntryParse {
        source: x509_parser::nom::Err<x509_parser::error::X509Error>,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to parse certificate"))]
    CertParse {
        source: x509_parser::nom::Err<x509_parser::error::X509Error>,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to parse PEM input"))]
    PemParse {
        source: x509_parser::nom::Err<x509_parser::error::PEMError>,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Unsupported CRL signature algorithm {oid}"))]
    UnsupportedSignatureAlgorithm {
        oid: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Signature verification failed to run"))]
    SignatureCheck {
        source: openssl::error::ErrorStack,
        #[snafu(implicit)]
        location: Location,
    },
}
