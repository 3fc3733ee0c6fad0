//! Configuration schema definitions.
//!
//! Every section has serde defaults, so an empty file (or none at all) yields
//! a client for `ws://127.0.0.1:3001/ws` with the standard timeouts.
//!
//! ```toml
//! [connection]
//! url = "ws://127.0.0.1:3001/ws"
//! access_token = "secret"
//!
//! [connection.reconnect]
//! max_retries = 5
//!
//! [calls]
//! blocking_timeout_ms = 10000
//!
//! [logging]
//! level = "debug"
//! format = "pretty"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use bronze_core::{ReconnectPolicy, WsClientConfig};
use bronze_framework::DEFAULT_ERROR_REPLY;
use bronze_onebot::{CallPolicy, CodecConfig, DEFAULT_FIRE_AND_FORGET};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BronzeConfig {
    pub connection: ConnectionConfig,
    pub calls: CallsConfig,
    pub codec: CodecConfig,
    pub dispatch: DispatchConfig,
    pub commands: CommandsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Connection
// =============================================================================

/// The socket to the OneBot implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub url: String,
    /// Sent as `Authorization: Bearer <token>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Capacity of the outbound write queue.
    pub send_queue: usize,
    pub reconnect: ReconnectConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3001/ws".to_string(),
            access_token: None,
            send_queue: 64,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ConnectionConfig {
    /// Converts to the transport's client configuration.
    pub fn to_ws_config(&self) -> WsClientConfig {
        let config = WsClientConfig {
            send_queue: self.send_queue,
            ..WsClientConfig::new(self.url.clone())
        }
        .with_reconnect(self.reconnect.to_policy());

        match &self.access_token {
            Some(token) => config.with_token(token.clone()),
            None => config,
        }
    }
}

/// Backoff after an established link drops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 16000,
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    pub fn to_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.enabled,
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

// =============================================================================
// Calls
// =============================================================================

/// Call timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallsConfig {
    pub blocking_timeout_ms: u64,
    pub fire_and_forget_timeout_ms: u64,
    /// Actions that resolve to a synthesized success on timeout.
    pub fire_and_forget_actions: Vec<String>,
}

impl Default for CallsConfig {
    fn default() -> Self {
        Self {
            blocking_timeout_ms: 10_000,
            fire_and_forget_timeout_ms: 3_000,
            fire_and_forget_actions: DEFAULT_FIRE_AND_FORGET
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CallsConfig {
    pub fn to_policy(&self) -> CallPolicy {
        CallPolicy {
            blocking_timeout: Duration::from_millis(self.blocking_timeout_ms),
            fire_and_forget_timeout: Duration::from_millis(self.fire_and_forget_timeout_ms),
            fire_and_forget: self
                .fire_and_forget_actions
                .iter()
                .cloned()
                .collect::<HashSet<_>>(),
        }
    }
}

// =============================================================================
// Dispatch / Commands / Storage
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Dispatches in flight at once. Defaults to twice the available
    /// parallelism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Reply sent when a command fails.
    pub error_reply: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            error_reply: DEFAULT_ERROR_REPLY.to_string(),
        }
    }
}

/// Where bot logic keeps its profiles.
///
/// The runtime does not open storage itself. Applications read this section
/// through [`BronzeRuntime::config`](crate::BronzeRuntime::config) to pick
/// the `ProfileStore` they hand to their commands. `memory://` selects the
/// in-process store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub uri: String,
    pub database: String,
}

impl StorageConfig {
    /// The uri scheme, e.g. `mongodb`. `None` if the uri has none.
    pub fn scheme(&self) -> Option<&str> {
        self.uri
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .filter(|scheme| !scheme.is_empty())
    }

    /// Whether profiles stay in process memory.
    pub fn is_memory(&self) -> bool {
        self.scheme() == Some("memory")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://127.0.0.1:27017".to_string(),
            database: "bronze".to_string(),
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file is rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Required when `output` is `file`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    pub thread_ids: bool,
    /// Show file and line of each event.
    pub file_location: bool,
    pub span_events: SpanEventConfig,
    /// Per-target levels, e.g. `bronze_transport = "trace"`.
    pub filters: BTreeMap<String, LogLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BronzeConfig::default();
        assert_eq!(config.connection.url, "ws://127.0.0.1:3001/ws");
        assert_eq!(config.connection.reconnect.max_retries, 5);
        assert_eq!(config.calls.blocking_timeout_ms, 10_000);
        assert_eq!(config.calls.fire_and_forget_timeout_ms, 3_000);
        assert_eq!(config.storage.database, "bronze");
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_partial_sections_deserialize() {
        let config: BronzeConfig = serde_json::from_value(serde_json::json!({
            "connection": {"url": "wss://bot.example.com/ws", "access_token": "t"},
            "logging": {"level": "debug", "filters": {"bronze_transport": "trace"}}
        }))
        .unwrap();

        assert_eq!(config.connection.send_queue, 64);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.logging.filters.get("bronze_transport"),
            Some(&LogLevel::Trace)
        );
        assert_eq!(config.calls, CallsConfig::default());
    }

    #[test]
    fn test_conversions() {
        let mut config = BronzeConfig::default();
        config.connection.access_token = Some("secret".into());
        config.connection.reconnect.max_retries = 2;

        let ws = config.connection.to_ws_config();
        assert_eq!(ws.access_token.as_deref(), Some("secret"));
        assert_eq!(ws.reconnect.max_retries, 2);
        assert_eq!(ws.reconnect.max_delay, Duration::from_secs(16));

        let policy = config.calls.to_policy();
        assert!(policy.is_fire_and_forget("send_group_msg"));
        assert_eq!(policy.timeout_for("get_status"), Duration::from_secs(10));
    }
}
