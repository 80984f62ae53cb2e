use thiserror::Error;

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("TLS is not configured")]
    TlsNotConfigured,

    #[error("Failed to load certificate: {0}")]
    CertificateLoadError(String),

    #[error("Failed to load private key: {0}")]
    PrivateKeyLoadError(String),

    #[error("Invalid TLS configuration: {0}")]
    TlsConfigError(String),

    #[error("No cipher suite matched the configured list")]
    NoCipherSuites,

    #[error("TLS handshake failed: {0}")]
    TlsHandshakeError(String),
}
