use serde::Deserialize;

use dimse::ProxyAeConfig;

use super::logging_config::LoggingConfig;
use super::proxy_config::ProxyConfig;
use super::Cli;

/// Root configuration for the proxy process: one or more proxy Application
/// Entities, each with its own bind address, forward rules and spool
/// layout, plus process-wide logging settings.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// The proxy Application Entities this process listens as.
    #[serde(rename = "application_entity", default)]
    pub application_entities: Vec<ProxyAeConfig>,
}

impl Config {
    /// Load and validate configuration from the path named on the command
    /// line. Configuration is read once at startup; any error here is
    /// fatal before the proxy accepts its first association.
    pub fn from_args(cli: Cli) -> Self {
        let contents =
            std::fs::read_to_string(&cli.config_path).expect("Failed to read config file");

        let config: Config =
            toml::from_str(&contents).expect("Failed to parse config file as TOML");

        config.validate().expect("Invalid configuration");

        config
    }

    /// Validate every section of the configuration eagerly, before the
    /// proxy starts accepting associations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_entities.is_empty() {
            return Err(ConfigError::MissingApplicationEntities);
        }

        let mut seen_aets = std::collections::HashSet::new();
        for ae in &self.application_entities {
            ae.validate().map_err(|e| ConfigError::InvalidApplicationEntity {
                name: ae.local_aet.clone(),
                reason: e.to_string(),
            })?;

            if !seen_aets.insert(ae.local_aet.clone()) {
                return Err(ConfigError::DuplicateApplicationEntity {
                    name: ae.local_aet.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no proxy application entities configured")]
    MissingApplicationEntities,

    #[error("application entity '{name}' is duplicated")]
    DuplicateApplicationEntity { name: String },

    #[error("application entity '{name}' is invalid: {reason}")]
    InvalidApplicationEntity { name: String, reason: String },
}
