//! TLS material: file loading and local-development certificate generation.
//!
//! The server takes its key and certificate from PEM files
//! ([`TlsFiles`]). When no files are supplied, a [`CertificateProvider`]
//! fills the gap: [`DevCertificates`] generates a self-signed pair for
//! `localhost` and [`materialize`] persists it to `key.pem` / `cert.pem`
//! next to the process before serving starts.
//!
//! Production deployments should terminate TLS at the proxy or supply real
//! certificate files; the generated pair exists so `https://localhost` works
//! during development without ceremony.

use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use rustls_pemfile::{certs, pkcs8_private_keys};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::info;

use crate::error::Error;

/// File names the generated material is persisted under.
pub(crate) const KEY_FILE: &str = "key.pem";
pub(crate) const CERT_FILE: &str = "cert.pem";

/// Paths to a PEM private key and certificate chain on disk.
#[derive(Clone, Debug)]
pub struct TlsFiles {
    pub key: PathBuf,
    pub cert: PathBuf,
}

impl TlsFiles {
    pub fn new(key: impl Into<PathBuf>, cert: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            cert: cert.into(),
        }
    }
}

/// A freshly generated key/certificate pair, PEM-encoded.
pub struct GeneratedCertificate {
    pub key_pem: String,
    pub cert_pem: String,
}

/// Source of TLS material when no certificate files are supplied.
///
/// The server only ever sees PEM strings through this seam; swap in your own
/// provider to integrate an internal CA or an ACME client.
pub trait CertificateProvider {
    fn generate(&self) -> Result<GeneratedCertificate, Error>;
}

/// The default provider: an rcgen-backed self-signed certificate for
/// `localhost` and `127.0.0.1`.
pub struct DevCertificates;

impl CertificateProvider for DevCertificates {
    fn generate(&self) -> Result<GeneratedCertificate, Error> {
        let mut params =
            CertificateParams::new(vec!["localhost".to_owned(), "127.0.0.1".to_owned()])?;
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, "localhost");

        let key_pair = KeyPair::generate()?;
        let cert = params.self_signed(&key_pair)?;

        Ok(GeneratedCertificate {
            key_pem: key_pair.serialize_pem(),
            cert_pem: cert.pem(),
        })
    }
}

/// Generates a key/certificate pair through `provider` and persists it to
/// the fixed file names, returning the paths for the serve loop.
pub fn materialize(provider: &dyn CertificateProvider) -> Result<TlsFiles, Error> {
    let generated = provider.generate()?;
    std::fs::write(KEY_FILE, &generated.key_pem)?;
    std::fs::write(CERT_FILE, &generated.cert_pem)?;
    info!(key = KEY_FILE, cert = CERT_FILE, "generated tls material persisted");
    Ok(TlsFiles::new(KEY_FILE, CERT_FILE))
}

/// Builds a connection acceptor from PEM files on disk.
pub(crate) fn acceptor(files: &TlsFiles) -> Result<TlsAcceptor, Error> {
    let certificates = load_certificates(&files.cert)?;
    let key = load_key(&files.key)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certificates, key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, Error> {
    let pem = std::fs::read(path)?;
    let reader = &mut BufReader::new(Cursor::new(pem));
    let certificates: Vec<CertificateDer> = certs(reader).collect::<Result<Vec<_>, _>>()?;

    if certificates.is_empty() {
        return Err(Error::TlsMaterial(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    Ok(certificates)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, Error> {
    let pem = std::fs::read(path)?;
    let reader = &mut BufReader::new(Cursor::new(pem));
    let mut keys: Vec<PrivateKeyDer> = pkcs8_private_keys(reader)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(PrivateKeyDer::from)
        .collect();

    if keys.is_empty() {
        return Err(Error::TlsMaterial(format!(
            "no private keys found in {}",
            path.display()
        )));
    }

    Ok(keys.remove(0))
}
