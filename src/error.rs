//! Unified error type.

use thiserror::Error;

/// The error type returned by rudder's fallible operations.
///
/// Application-level failures (404, 400, etc.) are expressed as
/// [`Reply`](crate::Reply) values, not as `Error`s. This type surfaces
/// infrastructure failures: parsing the listen address, binding to a port,
/// loading or generating TLS material. None of them are retried — they
/// terminate the serve call.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid socket address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    #[error("certificate generation: {0}")]
    CertificateGeneration(#[from] rcgen::Error),

    #[error("tls material: {0}")]
    TlsMaterial(String),
}
