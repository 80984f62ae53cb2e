use clap::Parser;

/// Command-line arguments. Anything not given here comes from the
/// configuration file.
#[derive(Parser, Debug)]
#[command(name = "ferroftpd", about = "An async FTP server")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Override the control connection listen port.
    #[arg(short, long)]
    pub port: Option<u16>,
}
