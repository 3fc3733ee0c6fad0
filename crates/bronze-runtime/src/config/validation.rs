//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BronzeConfig, CallsConfig, ConnectionConfig, LogFormat, LogOutput, LoggingConfig,
    ReconnectConfig, StorageConfig,
};

/// Validates the entire configuration.
pub fn validate_config(config: &BronzeConfig) -> ConfigResult<()> {
    validate_connection(&config.connection)?;
    validate_calls(&config.calls)?;
    validate_storage(&config.storage)?;
    validate_logging(&config.logging)?;

    if config.dispatch.max_concurrency == Some(0) {
        return Err(ConfigError::validation(
            "dispatch.max_concurrency must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_connection(connection: &ConnectionConfig) -> ConfigResult<()> {
    validate_url(&connection.url)?;

    if connection.send_queue == 0 {
        return Err(ConfigError::validation(
            "connection.send_queue must be greater than 0",
        ));
    }

    validate_reconnect(&connection.reconnect)
}

fn validate_reconnect(retry: &ReconnectConfig) -> ConfigResult<()> {
    if !retry.enabled {
        return Ok(());
    }

    if retry.initial_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Initial retry delay must be greater than 0",
        ));
    }

    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(ConfigError::validation(
            "Max retry delay must be greater than or equal to initial delay",
        ));
    }

    if retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::validation(
            "Backoff multiplier must be at least 1.0",
        ));
    }

    Ok(())
}

fn validate_calls(calls: &CallsConfig) -> ConfigResult<()> {
    if calls.blocking_timeout_ms == 0 || calls.fire_and_forget_timeout_ms == 0 {
        return Err(ConfigError::validation("Call timeouts must be greater than 0"));
    }
    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> ConfigResult<()> {
    if storage.scheme().is_none() {
        return Err(ConfigError::validation(format!(
            "storage.uri must look like <scheme>://..., got {:?}",
            storage.uri
        )));
    }
    if storage.database.is_empty() {
        return Err(ConfigError::validation("storage.database must not be empty"));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }

    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "JSON log format requires the `json-log` feature",
        ));
    }

    Ok(())
}

/// Only `ws://` and `wss://` endpoints are accepted.
fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::validation("connection.url must not be empty"));
    }

    let valid_schemes = ["ws://", "wss://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&BronzeConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_url_scheme() {
        let mut config = BronzeConfig::default();
        config.connection.url = "http://127.0.0.1:3000".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));

        config.connection.url = "wss://bot.example.com/ws".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_retry_values() {
        let mut config = BronzeConfig::default();
        config.connection.reconnect.max_delay_ms = 10;
        assert!(validate_config(&config).is_err());

        // Ignored when reconnecting is off.
        config.connection.reconnect.enabled = false;
        assert!(validate_config(&config).is_ok());

        let mut config = BronzeConfig::default();
        config.connection.reconnect.backoff_multiplier = 0.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_timeouts_and_concurrency() {
        let mut config = BronzeConfig::default();
        config.calls.fire_and_forget_timeout_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = BronzeConfig::default();
        config.dispatch.max_concurrency = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = BronzeConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("logs/bronze.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_storage() {
        let mut config = BronzeConfig::default();
        assert_eq!(config.storage.scheme(), Some("mongodb"));
        assert!(!config.storage.is_memory());

        config.storage.uri = "memory://".into();
        assert!(config.storage.is_memory());
        assert!(validate_config(&config).is_ok());

        config.storage.uri = "127.0.0.1:27017".into();
        assert!(validate_config(&config).is_err());

        let mut config = BronzeConfig::default();
        config.storage.database.clear();
        assert!(validate_config(&config).is_err());
    }
}
