//! Configuration for the FX engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// HTTP listen host
    pub host: String,

    /// HTTP listen port
    pub port: u16,

    /// Actix worker count
    pub workers: usize,

    /// Data directory for durable deals and reference documents
    pub data_dir: PathBuf,

    /// Quote validity window (seconds)
    pub quote_ttl_seconds: u64,

    /// Rate source fetch timeout (milliseconds)
    pub rate_timeout_ms: u64,

    /// How stale a cached rate may be and still be served as INDICATIVE (seconds)
    pub rate_stale_seconds: u64,

    /// UTC offset (minutes) in which rule `time_of_day` criteria evaluate.
    /// One zone per deployment.
    pub rule_tz_offset_minutes: i32,

    /// Provider-selection rules document (relative to `data_dir`)
    pub provider_rules_file: String,

    /// Margin-adjustment rules document (relative to `data_dir`)
    pub margin_rules_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "fx-engine".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8085,
            workers: 4,
            data_dir: PathBuf::from("./data/fx"),
            quote_ttl_seconds: 60,
            rate_timeout_ms: 2_000,
            rate_stale_seconds: 30,
            rule_tz_offset_minutes: 0,
            provider_rules_file: "provider_rules.json".to_string(),
            margin_rules_file: "margin_rules.json".to_string(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults with environment overrides
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("FX_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("FX_PORT") {
            config.port = port
                .parse()
                .map_err(|_| crate::Error::Config(format!("Invalid FX_PORT: {}", port)))?;
        }

        if let Ok(data_dir) = std::env::var("FX_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(ttl) = std::env::var("FX_QUOTE_TTL_SECONDS") {
            config.quote_ttl_seconds = ttl
                .parse()
                .map_err(|_| crate::Error::Config(format!("Invalid FX_QUOTE_TTL_SECONDS: {}", ttl)))?;
        }

        Ok(config)
    }

    /// Absolute path of the provider rules document
    pub fn provider_rules_path(&self) -> PathBuf {
        self.data_dir.join(&self.provider_rules_file)
    }

    /// Absolute path of the margin rules document
    pub fn margin_rules_path(&self) -> PathBuf {
        self.data_dir.join(&self.margin_rules_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "fx-engine");
        assert_eq!(config.quote_ttl_seconds, 60);
        assert_eq!(config.rate_timeout_ms, 2_000);
    }
}
