use serde::Deserialize;

/// Top-level settings that apply to the proxy process as a whole, distinct
/// from any one Application Entity's bind/spool/rule configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
