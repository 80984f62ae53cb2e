use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_port: u16,
    pub pasv_address: String,
    pub chroot_dir: String,
    pub min_homedir: String,
    pub user_file: String,
    /// Passive data ports handed out round-robin; empty or absent = ephemeral.
    pub pasv_ports: Option<Vec<u16>>,
    pub idle_timeout_secs: Option<u64>,
    pub accept_timeout_secs: Option<u64>,
    /// Server-wide transfer ceiling in KiB/s; 0 = unlimited.
    pub max_rate_kib: Option<u64>,
    pub upload_buffer_size: Option<usize>,
    pub download_buffer_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsSection {
    pub enabled: bool,
    pub cert_file: String,
    pub key_file: String,
    /// Cipher suite names to enable; empty or ["*"] = all supported.
    pub cipher_suites: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub tls: Option<TlsSection>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: 21,
            pasv_address: String::from("0.0.0.0"),
            chroot_dir: String::from("/var/ftp"),
            min_homedir: String::from("/home/ftp"),
            user_file: String::from("etc/users.toml"),
            pasv_ports: None,
            idle_timeout_secs: Some(300),
            accept_timeout_secs: Some(30),
            max_rate_kib: Some(0),
            upload_buffer_size: Some(256 * 1024),
            download_buffer_size: Some(128 * 1024),
        }
    }
}

impl Default for TlsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            cert_file: String::from("etc/ssl/cert.pem"),
            key_file: String::from("etc/ssl/key.pem"),
            cipher_suites: vec![String::from("*")],
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_timeout_secs.unwrap_or(300))
    }

    pub fn accept_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.accept_timeout_secs.unwrap_or(30))
    }

    /// Server-wide rate ceiling in bytes per second, `None` when unlimited.
    pub fn rate_ceiling(&self) -> Option<u64> {
        match self.max_rate_kib {
            Some(0) | None => None,
            Some(kib) => Some(kib * 1024),
        }
    }
}

impl Config {
    /// Set defaults for fields the config file left out.
    pub fn fill_defaults(&mut self) {
        if self.server.upload_buffer_size.is_none() {
            self.server.upload_buffer_size = Some(256 * 1024);
        }
        if self.server.download_buffer_size.is_none() {
            self.server.download_buffer_size = Some(128 * 1024);
        }
        if self.server.idle_timeout_secs.is_none() {
            self.server.idle_timeout_secs = Some(300);
        }
        if self.server.accept_timeout_secs.is_none() {
            self.server.accept_timeout_secs = Some(30);
        }
    }
}
