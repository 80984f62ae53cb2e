use crate::config::TlsSection;
use crate::core_tls::error::TlsError;
use log::info;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::{rustls, TlsAcceptor};

/// TLS acceptor shared by all data channels of the server.
///
/// The server side of the TLS handshake is used for both passive and active
/// data connections; only the TCP direction differs between the two modes.
pub struct TlsContext {
    acceptor: TlsAcceptor,
}

impl TlsContext {
    pub fn new(section: &TlsSection) -> Result<Self, TlsError> {
        let certs = std::fs::read(&section.cert_file)
            .map_err(|e| TlsError::CertificateLoadError(e.to_string()))?;
        let key = std::fs::read(&section.key_file)
            .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;

        let cert_chain = rustls_pemfile::certs(&mut &certs[..])
            .map_err(|e| TlsError::CertificateLoadError(e.to_string()))?;
        let mut keys = rustls_pemfile::pkcs8_private_keys(&mut &key[..])
            .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;

        let private_key = match keys.pop() {
            Some(k) => k,
            None => {
                return Err(TlsError::PrivateKeyLoadError(
                    "No private key found".to_string(),
                ))
            }
        };

        let cert_chain: Vec<rustls::Certificate> =
            cert_chain.into_iter().map(rustls::Certificate).collect();
        let private_key = rustls::PrivateKey(private_key);

        let suites = select_cipher_suites(&section.cipher_suites)?;
        info!("TLS enabled with {} cipher suites", suites.len());

        let config = rustls::ServerConfig::builder()
            .with_cipher_suites(&suites)
            .with_safe_default_kx_groups()
            .with_safe_default_protocol_versions()
            .map_err(|e| TlsError::TlsConfigError(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(cert_chain, private_key)
            .map_err(|e| TlsError::TlsConfigError(e.to_string()))?;

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    /// Runs the server-side TLS handshake over an established data connection.
    pub async fn accept(
        &self,
        stream: TcpStream,
    ) -> Result<tokio_rustls::server::TlsStream<TcpStream>, TlsError> {
        self.acceptor
            .accept(stream)
            .await
            .map_err(|e| TlsError::TlsHandshakeError(e.to_string()))
    }
}

/// Resolves the configured cipher suite names against the suites rustls
/// supports. An empty list or a `"*"` entry enables every supported suite.
fn select_cipher_suites(
    names: &[String],
) -> Result<Vec<rustls::SupportedCipherSuite>, TlsError> {
    let wildcard = names.is_empty() || names.iter().any(|n| n == "*");
    if wildcard {
        return Ok(rustls::ALL_CIPHER_SUITES.to_vec());
    }

    let selected: Vec<rustls::SupportedCipherSuite> = rustls::ALL_CIPHER_SUITES
        .iter()
        .filter(|s| {
            let name = format!("{:?}", s.suite());
            names.iter().any(|n| n.eq_ignore_ascii_case(&name))
        })
        .copied()
        .collect();

    if selected.is_empty() {
        return Err(TlsError::NoCipherSuites);
    }
    Ok(selected)
}
