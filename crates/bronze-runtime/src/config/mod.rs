//! Layered configuration for the bronze runtime.
//!
//! Defaults, then TOML/YAML files, then `BRONZE_*` environment variables,
//! extracted into [`BronzeConfig`] and checked by [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BronzeConfig, CallsConfig, CommandsConfig, ConnectionConfig, DispatchConfig, LogFormat,
    LogLevel, LogOutput, LogRotation, LoggingConfig, ReconnectConfig, SpanEventConfig,
    StorageConfig,
};
pub use validation::validate_config;
