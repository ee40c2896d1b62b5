//! Errors raised while resolving, parsing, validating or saving `serial-iface`
//! configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A resolved config file (explicit, local or platform) could not be read.
    #[error("Cannot read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file '{path}' is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Cannot encode configuration as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Cannot write configuration file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value parsed but no backend could use it, e.g. `serial.data_bits = 9`.
    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },

    /// A `SERIAL_IFACE_<SECTION>_<KEY>` override could not be parsed.
    #[error("Invalid environment override {var}: {message}")]
    EnvOverride { var: String, message: String },

    /// `save` was called on a loader that was built from defaults.
    #[error("No configuration file to save to; set SERIAL_IFACE_CONFIG or use save_to")]
    NoConfigPath,
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_override(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvOverride {
            var: var.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
