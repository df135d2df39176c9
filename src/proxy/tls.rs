use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use rustls::ServerConfig;
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{certs, pkcs8_private_keys, rsa_private_keys};
use tokio_rustls::TlsAcceptor;

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read certs from {}", path.display()))?;
    let certs = certs(&mut BufReader::new(&data[..]))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("failed to parse certs: {e}"))?;
    if certs.is_empty() {
        return Err(anyhow!("no certificates found in {}", path.display()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read key from {}", path.display()))?;
    if let Some(key) = pkcs8_private_keys(&mut BufReader::new(&data[..])).next() {
        let key = key.map_err(|e| anyhow!("failed to parse pkcs8 key: {e}"))?;
        return Ok(PrivateKeyDer::Pkcs8(key));
    }

    if let Some(key) = rsa_private_keys(&mut BufReader::new(&data[..])).next() {
        let key = key.map_err(|e| anyhow!("failed to parse rsa key: {e}"))?;
        return Ok(PrivateKeyDer::from(key));
    }

    Err(anyhow!("no valid private key found in {}", path.display()))
}

/// Builds the acceptor for the client-facing listener. Both HTTP/2 and
/// HTTP/1.1 are offered over ALPN.
pub fn build_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;
    let mut config = ServerConfig::builder_with_provider(ring::default_provider().into())
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| anyhow!("failed to build server config: {e}"))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_files_are_reported() {
        let err = build_tls_acceptor(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/cert.pem"), "{err:#}");
    }

    #[test]
    fn files_without_pem_blocks_are_rejected() {
        let mut cert = tempfile::NamedTempFile::new().unwrap();
        writeln!(cert, "not a certificate").unwrap();
        let err = load_certs(cert.path()).unwrap_err();
        assert!(err.to_string().starts_with("no certificates found"), "{err:#}");

        let mut key = tempfile::NamedTempFile::new().unwrap();
        writeln!(key, "not a key").unwrap();
        let err = load_key(key.path()).unwrap_err();
        assert!(err.to_string().starts_with("no valid private key"), "{err:#}");
    }
}
