//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::port::{
    BackendKind, BackendOptions, Parity, PortParams, StopBits, DEFAULT_POLL_INTERVAL,
    DEFAULT_TERMINATOR,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend selection
    pub backend: BackendConfig,
    /// Line parameters applied after open
    pub serial: SerialConfig,
    /// Virtual backend settings
    pub virtual_port: VirtualPortConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Options handed to the backend selector.
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            terminator: self.virtual_port.terminator.as_bytes().to_vec(),
            poll_interval: self.backend.poll_interval(),
        }
    }

    /// Reject values no backend could sensibly use.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.backend.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "backend.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.serial.default_baud == 0 {
            return Err(ConfigError::invalid(
                "serial.default_baud",
                "must be greater than zero",
            ));
        }
        if !(5..=8).contains(&self.serial.data_bits) {
            return Err(ConfigError::invalid(
                "serial.data_bits",
                format!("{} is outside 5..=8", self.serial.data_bits),
            ));
        }
        Ok(())
    }
}

/// Backend selection section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// "native" or "virtual"
    pub kind: BackendKind,
    /// Upper bound on each sleep inside wait_events, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Native,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl BackendConfig {
    /// Get the poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Serial line configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port used when a command does not name one
    pub default_port: Option<String>,
    /// Request exclusive access on open
    pub exclusive: bool,
    /// Default baud rate for new connections
    pub default_baud: u32,
    pub data_bits: u8,
    pub stop_bits: StopBits,
    pub parity: Parity,
    /// Initial RTS level
    pub rts: bool,
    /// Initial DTR level
    pub dtr: bool,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let params = PortParams::default();
        Self {
            default_port: None,
            exclusive: true,
            default_baud: 115200,
            data_bits: params.data_bits,
            stop_bits: params.stop_bits,
            parity: params.parity,
            rts: params.rts,
            dtr: params.dtr,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Line parameters described by this section.
    pub fn to_params(&self) -> PortParams {
        PortParams {
            baud_rate: self.default_baud,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
            rts: self.rts,
            dtr: self.dtr,
            flags: 0,
        }
    }
}

/// Virtual backend section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualPortConfig {
    /// Appended to every write before it loops back
    pub terminator: String,
}

impl Default for VirtualPortConfig {
    fn default() -> Self {
        Self {
            terminator: String::from_utf8_lossy(DEFAULT_TERMINATOR).into_owned(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "pretty" or "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line format with colors
    Pretty,
    /// Single-line format
    #[default]
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.kind, BackendKind::Native);
        assert_eq!(config.backend.poll_interval_ms, 250);
        assert_eq!(config.serial.default_baud, 115200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_alias_resolution() {
        let mut config = SerialConfig::default();
        config
            .port_aliases
            .insert("arduino".to_string(), "/dev/ttyACM0".to_string());

        assert_eq!(config.resolve_port("arduino"), "/dev/ttyACM0");
        assert_eq!(config.resolve_port("COM5"), "COM5");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[backend]"));
        assert!(toml_str.contains("[virtual_port]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [backend]
            kind = "virtual"

            [serial]
            default_baud = 9600
            parity = "even"

            [virtual_port]
            terminator = "\r\n"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.kind, BackendKind::Virtual);
        assert_eq!(config.serial.default_baud, 9600);
        assert_eq!(config.serial.parity, Parity::Even);
        assert_eq!(config.backend_options().terminator, b"\r\n");
        // Defaults should still work
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_to_params() {
        let serial = SerialConfig {
            default_baud: 57600,
            rts: false,
            ..Default::default()
        };
        let params = serial.to_params();
        assert_eq!(params.baud_rate, 57600);
        assert!(!params.rts);
        assert_eq!(params.data_bits, 8);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.serial.data_bits = 9;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));

        let mut config = Config::default();
        config.backend.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
