use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls::ServerConfig;
use rustls_pemfile::{ certs, pkcs8_private_keys };
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use crate::error::RelayError;

pub fn load_tls_config(cert_path: &str, key_path: &str) -> Result<Arc<ServerConfig>, RelayError> {
    let cert_file = File::open(cert_path).map_err(|e|
        RelayError::Tls(format!("Failed to open TLS certificate file '{}': {}", cert_path, e))
    )?;
    let key_file = File::open(key_path).map_err(|e|
        RelayError::Tls(format!("Failed to open TLS key file '{}': {}", key_path, e))
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| RelayError::Tls(format!("Failed to read certificate(s): {}", e)))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(RelayError::Tls(format!("Error reading private key: {}", e)));
        }
        None => {
            return Err(RelayError::Tls("No PKCS8 private key found in key file".into()));
        }
    };

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| RelayError::Tls(e.to_string()))?;

    Ok(Arc::new(config))
}

/// Resolves the TLS flags into a config, or `None` for plain WS/HTTP.
pub fn resolve_tls(
    enable_tls: bool,
    cert_path: Option<&str>,
    key_path: Option<&str>
) -> Result<Option<Arc<ServerConfig>>, RelayError> {
    if !enable_tls {
        return Ok(None);
    }
    match (cert_path, key_path) {
        (Some(cert), Some(key)) => load_tls_config(cert, key).map(Some),
        (Some(_), None) | (None, Some(_)) => {
            Err(
                RelayError::Tls(
                    "Both --tls-cert-path and --tls-key-path must be provided to enable TLS".into()
                )
            )
        }
        (None, None) => {
            Err(RelayError::Tls("--enable-tls was set but no certificate/key paths provided".into()))
        }
    }
}
