//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. Main config file (`bronze.toml` / `bronze.yaml`), the first one found
//! 4. Its profile variant (`bronze.{profile}.toml` / `bronze.{profile}.yaml`)
//! 5. Environment variables (`BRONZE_*`)
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: searches `bronze.toml` and `config.toml`
//! - `yaml-config`: searches `bronze.yaml`, `bronze.yml`, `config.yaml` and `config.yml`
//!
//! # Environment Variable Mapping
//!
//! Variables use the `BRONZE_` prefix with `__` between nested keys:
//!
//! - `BRONZE_CONNECTION__URL=ws://10.0.0.2:3001` → `connection.url`
//! - `BRONZE_CONNECTION__ACCESS_TOKEN=xxx` → `connection.access_token`
//! - `BRONZE_LOGGING__LEVEL=debug` → `logging.level`
//!
//! The active profile comes from [`ConfigLoader::profile`] or `BRONZE_PROFILE`.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ConfigLoader::new().profile("production").load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::BronzeConfig;

const ENV_PREFIX: &str = "BRONZE_";
const PROFILE_VAR: &str = "BRONZE_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `dev` and `prod` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `BRONZE_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration loader.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Overrides the search when set.
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/bronze` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("bronze")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a whole configuration over the defaults.
    pub fn merge(mut self, config: BronzeConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<BronzeConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;
        let config: BronzeConfig = figment.extract()?;

        debug!(
            profile = %profile,
            url = %config.connection.url,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let overrides = std::mem::take(&mut self.figment);
        let mut figment =
            Figment::from(Serialized::defaults(BronzeConfig::default())).merge(overrides);

        match &self.config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.clone()));
                }
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                let format = FileFormat::from_extension(ext)
                    .ok_or_else(|| ConfigError::UnsupportedFormat(ext.to_string()))?;
                info!(path = %path.display(), "Loading configuration file");
                figment = format.merge(figment, path);
            }
            None => figment = self.search_config_files(figment),
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }

        Ok(figment)
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("bronze")))
            .collect()
    }

    /// Finds the first `dir/name` in search order and merges it, then its
    /// `{stem}.{profile}.{ext}` sibling on top if present.
    fn search_config_files(&self, mut figment: Figment) -> Figment {
        let dirs = self.search_dirs();
        let found = dirs.iter().find_map(|dir| {
            FileFormat::ALL.iter().find_map(|format| {
                format
                    .file_names()
                    .iter()
                    .map(|name| dir.join(name))
                    .find(|path| path.is_file())
                    .map(|path| (*format, path))
            })
        });

        let Some((format, base)) = found else {
            warn!(paths = ?dirs, "No configuration file found, using defaults");
            return figment;
        };

        info!(path = %base.display(), "Loading configuration file");
        figment = format.merge(figment, &base);

        if let Some(profiled) = profile_variant(&base, &self.profile)
            && profiled.is_file()
        {
            debug!(path = %profiled.display(), profile = %self.profile, "Loading profile config");
            figment = format.merge(figment, &profiled);
        }
        figment
    }
}

/// `bronze.toml` + `production` → `bronze.production.toml`.
fn profile_variant(base: &Path, profile: &Profile) -> Option<PathBuf> {
    let stem = base.file_stem()?.to_str()?;
    let ext = base.extension()?.to_str()?;
    Some(base.with_file_name(format!("{stem}.{profile}.{ext}")))
}

/// Configuration file formats enabled at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl FileFormat {
    const ALL: &'static [FileFormat] = &[
        #[cfg(feature = "toml-config")]
        FileFormat::Toml,
        #[cfg(feature = "yaml-config")]
        FileFormat::Yaml,
    ];

    fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|format| format.extensions().iter().any(|e| *e == ext))
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["yaml", "yml"],
        }
    }

    fn file_names(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["bronze.toml", "config.toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["bronze.yaml", "bronze.yml", "config.yaml", "config.yml"],
        }
    }

    #[allow(unused_variables)]
    fn merge(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(Yaml::file(path)),
        }
    }
}

/// Loads from the current directory and the user config directory.
pub fn load_config() -> ConfigResult<BronzeConfig> {
    ConfigLoader::new()
        .with_current_dir()
        .with_user_config_dir()
        .load()
}

/// Loads `path` plus environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<BronzeConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::schema::LogLevel;

    fn to_figment(e: ConfigError) -> figment::Error {
        figment::Error::from(e.to_string())
    }

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(to_figment)?;
            assert_eq!(config, BronzeConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("BRONZE_CONNECTION__URL", "ws://10.0.0.2:3001");
            jail.set_env("BRONZE_CONNECTION__RECONNECT__MAX_RETRIES", "9");
            jail.set_env("BRONZE_LOGGING__LEVEL", "debug");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(to_figment)?;
            assert_eq!(config.connection.url, "ws://10.0.0.2:3001");
            assert_eq!(config.connection.reconnect.max_retries, 9);
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_file_then_profile_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "bronze.toml",
                r#"
                    [connection]
                    url = "ws://file:3001/ws"
                    access_token = "from-file"

                    [calls]
                    blocking_timeout_ms = 5000
                "#,
            )?;
            jail.create_file(
                "bronze.production.toml",
                r#"
                    [calls]
                    blocking_timeout_ms = 20000
                    fire_and_forget_timeout_ms = 1000
                "#,
            )?;
            jail.set_env("BRONZE_CONNECTION__ACCESS_TOKEN", "from-env");

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .load()
                .map_err(to_figment)?;

            assert_eq!(config.connection.url, "ws://file:3001/ws");
            assert_eq!(config.connection.access_token.as_deref(), Some("from-env"));
            assert_eq!(config.calls.blocking_timeout_ms, 20000);
            assert_eq!(config.calls.fire_and_forget_timeout_ms, 1000);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = ConfigLoader::new()
            .file("/definitely/not/here/bronze.toml")
            .without_env()
            .load();
        assert!(matches!(err, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_profile_variant_name() {
        let path = profile_variant(Path::new("/etc/bronze/bronze.toml"), &Profile::Production);
        assert_eq!(path, Some(PathBuf::from("/etc/bronze/bronze.production.toml")));
        assert_eq!(profile_variant(Path::new("bronze"), &Profile::Development), None);
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
