//! Configuration module for serial-iface.
//!
//! TOML-based configuration with environment variable overrides. The contract
//! itself never reads configuration; this layer feeds the selector and the
//! diagnostic binary, and is where line parameters get validated before they
//! reach a backend.
//!
//! # Configuration Resolution
//!
//! 1. `SERIAL_IFACE_CONFIG` environment variable (explicit path)
//! 2. `./serial-iface.toml` (current directory)
//! 3. `<platform config dir>/serial-iface/config.toml`
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `SERIAL_IFACE_<SECTION>_<KEY>`, for example:
//! - `SERIAL_IFACE_BACKEND_KIND=virtual`
//! - `SERIAL_IFACE_SERIAL_DEFAULT_BAUD=115200`
//! - `SERIAL_IFACE_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,ignore
//! use serial_iface::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let port = serial_iface::port::select_with(
//!     loader.config().backend.kind,
//!     &loader.config().backend_options(),
//! );
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{BackendConfig, Config, LogFormat, LoggingConfig, SerialConfig, VirtualPortConfig};
