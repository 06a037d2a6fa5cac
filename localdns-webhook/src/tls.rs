use std::path::{Path, PathBuf};

use log::debug;
use rustls_pemfile::Item;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Couldn't read '{}'! Reason: {}", .0.display(), .1)]
    Read(PathBuf, std::io::Error),
    #[error("'{}' isn't a valid PEM file! Reason: {}", .0.display(), .1)]
    InvalidPem(PathBuf, std::io::Error),
    #[error("'{}' doesn't contain any certificate!", .0.display())]
    MissingCertificate(PathBuf),
    #[error("'{}' doesn't contain any private key!", .0.display())]
    MissingPrivateKey(PathBuf),
}

/// PEM encoded key pair served by the webhook, loaded once at startup.
#[derive(Clone)]
pub struct TlsCredentials {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

impl TlsCredentials {
    pub async fn load(cert_path: &Path, key_path: &Path) -> Result<Self, TlsError> {
        let cert = read(cert_path).await?;
        let key = read(key_path).await?;

        Self::from_pem(cert, key, cert_path, key_path)
    }

    fn from_pem(
        cert: Vec<u8>,
        key: Vec<u8>,
        cert_path: &Path,
        key_path: &Path,
    ) -> Result<Self, TlsError> {
        let cert_items = parse_pem(&cert, cert_path)?;
        let certificates = cert_items
            .iter()
            .filter(|item| matches!(item, Item::X509Certificate(_)))
            .count();
        if certificates == 0 {
            return Err(TlsError::MissingCertificate(cert_path.to_owned()));
        }

        let key_items = parse_pem(&key, key_path)?;
        if !key_items.iter().any(|item| {
            matches!(
                item,
                Item::RSAKey(_) | Item::PKCS8Key(_) | Item::ECKey(_)
            )
        }) {
            return Err(TlsError::MissingPrivateKey(key_path.to_owned()));
        }

        debug!(
            "Loaded {certificates} certificate(s) from '{}' and a private key from '{}'",
            cert_path.display(),
            key_path.display()
        );

        Ok(Self { cert, key })
    }
}

async fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    tokio::fs::read(path)
        .await
        .map_err(|err| TlsError::Read(path.to_owned(), err))
}

fn parse_pem(raw: &[u8], path: &Path) -> Result<Vec<Item>, TlsError> {
    rustls_pemfile::read_all(&mut &raw[..]).map_err(|err| TlsError::InvalidPem(path.to_owned(), err))
}
