//! trackcast settings.
//!
//! Two sections: `[storage]` for the database and retention, `[weather]` for
//! the provider and refresh limits. Values are layered with figment.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::coordinator::FetchPolicy;
use crate::error::{Error, Result};

/// File looked up inside the config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Subdirectory used under the platform config and data dirs.
const DATA_DIR_NAME: &str = "trackcast";

/// SQLite file created under the data dir.
const DATABASE_FILE_NAME: &str = "trackcast.db";

/// Default WeatherAPI.com endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";

/// Everything trackcast reads from its environment.
///
/// Sources, highest precedence first:
/// 1. Environment variables (prefixed with `TRACKCAST_`, sections split on `__`)
/// 2. TOML config file at `~/.config/trackcast/config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database location and retention.
    pub storage: StorageConfig,
    /// Weather provider configuration.
    pub weather: WeatherConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit database file; `None` means the platform data dir.
    /// Defaults to `~/.local/share/trackcast/trackcast.db`
    pub database_path: Option<PathBuf>,
    /// Number of observations retained per track.
    pub retention_limit: usize,
}

/// Weather provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// WeatherAPI.com key.
    pub api_key: Option<String>,
    /// Base URL of the provider API.
    pub base_url: String,
    /// Age in hours after which a track's latest observation is stale.
    pub max_age_hours: u32,
    /// Timeout applied to each provider request.
    pub request_timeout_secs: u64,
    /// Upper bound on simultaneous provider calls during a bulk refresh.
    pub max_concurrent_fetches: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            retention_limit: 100,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_age_hours: 1,
            request_timeout_secs: 30,
            max_concurrent_fetches: 4,
        }
    }
}

impl Config {
    /// Load from the default config file, env and defaults.
    ///
    /// # Errors
    ///
    /// Fails if a source cannot be parsed or a value is out of range.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load using `config_path` in place of the default file. A missing file
    /// is not an error; the other layers still apply.
    ///
    /// # Errors
    ///
    /// Fails if a source cannot be parsed or a value is out of range.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("TRACKCAST_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/trackcast/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// `<local data dir>/trackcast`.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Reject settings the fetch path cannot work with.
    ///
    /// A `retention_limit` of zero is accepted; the store keeps at least the
    /// newest observation regardless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        if self.weather.base_url.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "base_url must not be empty".to_string(),
            });
        }

        if self.weather.request_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.weather.max_concurrent_fetches == 0 {
            return Err(Error::ConfigValidation {
                message: "max_concurrent_fetches must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// The configured database file, or `trackcast.db` in the data dir.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the provider request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.weather.request_timeout_secs)
    }

    /// Build the per-call fetch policy from the configured limits.
    #[must_use]
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            max_age_hours: self.weather.max_age_hours,
            retention_limit: self.storage.retention_limit,
        }
    }

    /// The configured API key, treating a blank value as missing.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.weather
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert_eq!(config.storage.retention_limit, 100);
        assert!(config.weather.api_key.is_none());
        assert_eq!(config.weather.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.weather.max_age_hours, 1);
        assert_eq!(config.weather.request_timeout_secs, 30);
        assert_eq!(config.weather.max_concurrent_fetches, 4);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_retention_is_accepted() {
        let mut config = Config::default();
        config.storage.retention_limit = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_base_url() {
        let mut config = Config::default();
        config.weather.base_url = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("base_url"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.weather.request_timeout_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("request_timeout_secs"));
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = Config::default();
        config.weather.max_concurrent_fetches = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_concurrent_fetches"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        assert!(config
            .database_path()
            .to_string_lossy()
            .contains("trackcast.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_request_timeout() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_fetch_policy_from_config() {
        let mut config = Config::default();
        config.storage.retention_limit = 25;
        config.weather.max_age_hours = 3;

        let policy = config.fetch_policy();
        assert_eq!(policy.retention_limit, 25);
        assert_eq!(policy.max_age_hours, 3);
    }

    #[test]
    fn test_api_key_blank_is_missing() {
        let mut config = Config::default();
        assert!(config.api_key().is_none());

        config.weather.api_key = Some("   ".to_string());
        assert!(config.api_key().is_none());

        config.weather.api_key = Some(" abc123 ".to_string());
        assert_eq!(config.api_key(), Some("abc123"));
    }

    #[test]
    fn test_default_paths() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("trackcast"));
        assert!(path.to_string_lossy().contains("config.toml"));
        assert!(Config::default_data_dir()
            .to_string_lossy()
            .contains("trackcast"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[storage]
retention_limit = 10

[weather]
api_key = "from-file"
max_age_hours = 2
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.storage.retention_limit, 10);
        assert_eq!(config.weather.max_age_hours, 2);
        assert_eq!(config.api_key(), Some("from-file"));
        // Untouched keys keep their defaults
        assert_eq!(config.weather.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[weather]\nrequest_timeout_secs = 0").unwrap();

        let result = Config::load_from(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(Error::ConfigValidation { .. })));
    }

    #[test]
    fn test_weather_config_deserialize() {
        let json = r#"{"max_age_hours": 6, "max_concurrent_fetches": 1}"#;
        let weather: WeatherConfig = serde_json::from_str(json).unwrap();
        assert_eq!(weather.max_age_hours, 6);
        assert_eq!(weather.max_concurrent_fetches, 1);
        assert_eq!(weather.base_url, DEFAULT_BASE_URL);
    }
}
