use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::transport::ConnectionConfig;
use crate::types::{Channel, TransferEncoding};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScopeConfig {
    pub connection: ScopeConnectionConfig,
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScopeConnectionConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Channel number (1-4) captures default to
    pub channel: u8,
    /// Bytes per sample for binary transfers, 1 or 2
    pub byte_width: u8,
    /// Captures averaged per fetch; 1 disables averaging
    pub average_count: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            connection: ScopeConnectionConfig::default(),
            capture: CaptureConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ScopeConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 10_000,
            write_timeout_ms: 5_000,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            channel: 1,
            byte_width: 2,
            average_count: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl ScopeConnectionConfig {
    pub fn timeouts(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}

impl CaptureConfig {
    pub fn channel(&self) -> Result<Channel, ConfigError> {
        Channel::from_number(self.channel)
            .map_err(|_| ConfigError::Message(format!("invalid channel number {}", self.channel)))
    }

    pub fn transfer_encoding(&self) -> Result<TransferEncoding, ConfigError> {
        if self.byte_width != 1 && self.byte_width != 2 {
            return Err(ConfigError::Message(format!(
                "byte_width must be 1 or 2, got {}",
                self.byte_width
            )));
        }
        Ok(TransferEncoding {
            byte_width: self.byte_width,
            ..TransferEncoding::default()
        })
    }
}

/// Load configuration from file with layered fallbacks
pub fn load_config(config_path: Option<&Path>) -> Result<ScopeConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&ScopeConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else if Path::new("scope.toml").exists() {
        builder = builder.add_source(File::with_name("scope.toml"));
    }

    // Environment overrides, e.g. TEKSCOPE_CONNECTION__HOST
    builder = builder.add_source(
        Environment::with_prefix("TEKSCOPE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize::<ScopeConfig>()
}

/// Load configuration with better error handling and defaults
pub fn load_config_or_default(config_path: Option<&Path>) -> ScopeConfig {
    match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            ScopeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = ScopeConfig::default();
        assert_eq!(cfg.connection.port, 4000);
        assert_eq!(cfg.capture.channel().unwrap(), Channel::Ch1);
        assert_eq!(cfg.capture.transfer_encoding().unwrap().byte_width, 2);
    }

    #[test]
    fn bad_capture_settings_are_rejected() {
        let cfg = CaptureConfig {
            channel: 7,
            byte_width: 4,
            average_count: 1,
        };
        assert!(cfg.channel().is_err());
        assert!(cfg.transfer_encoding().is_err());
    }
}
