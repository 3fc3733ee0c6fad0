//! Bronze Runtime: configuration, logging and bootstrap for a bronze bot.
//!
//! This crate provides:
//! - Layered configuration (`config`): defaults, `bronze.toml` / `bronze.yaml`
//!   with profile variants, and `BRONZE_*` environment variables
//! - Logging setup (`logging`) on `tracing-subscriber`
//! - [`BronzeRuntime`], which connects, dispatches events, routes commands
//!   and shuts down cleanly
//!
//! ```ignore
//! use bronze_runtime::BronzeRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = BronzeRuntime::builder().build()?;
//!     runtime.help_command(["帮助", "help"]);
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{BronzeConfig, ConfigError, ConfigLoader, ConfigResult, validate_config};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{BronzeRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for bot code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
