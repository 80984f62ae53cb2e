mod config;
mod core_cli;
mod core_framing;
mod core_ftpcommand;
mod core_network;
mod core_quota;
mod core_session;
mod core_tls;
mod core_transfer;
mod core_users;
mod helpers;
mod server;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use std::fs;
use std::io::Write;

use crate::config::Config;
use crate::core_cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    let default_config_path = if cfg!(target_os = "windows") {
        "C:\\ferroftpd\\etc\\ferroftpd.conf"
    } else {
        "/etc/ferroftpd.conf"
    };
    let config_path = if args.config.is_empty() {
        default_config_path
    } else {
        args.config.as_str()
    };

    let mut config = load_config(config_path)?;
    config.fill_defaults();
    if let Some(port) = args.port {
        config.server.listen_port = port;
    }

    server::run(config).await
}

fn load_config(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path))?;
    let config = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse configuration file: {}", path))?;
    Ok(config)
}
