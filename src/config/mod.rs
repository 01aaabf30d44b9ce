#[allow(clippy::module_inception)]
pub mod config;
mod logging_config;
mod proxy_config;
mod tests;

use clap::Parser;

pub use config::{Config, ConfigError};
pub use logging_config::LoggingConfig;
pub use proxy_config::ProxyConfig;

/// Startup arguments for the proxy process.
#[derive(Debug, Parser)]
#[command(name = "mpps-proxy", about = "DICOM MPPS forwarding and Dose SR transformation proxy")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long = "config", default_value = "config.toml")]
    pub config_path: String,
}

impl Cli {
    /// Creates a new `Cli` instance with the provided configuration path.
    ///
    /// # Arguments
    /// - `config_path`: The path to the configuration file.
    pub fn new(config_path: String) -> Self {
        Self { config_path }
    }
}
