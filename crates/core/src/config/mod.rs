//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (COSTMAP_*)
//! 2. TOML config file (if COSTMAP_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::Error;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (COSTMAP_*)
/// 2. TOML config file (if COSTMAP_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// BEA Regional API user id, needed for price parity.
    ///
    /// Set via COSTMAP_BEA_API_KEY environment variable.
    #[serde(default)]
    pub bea_api_key: Option<String>,

    /// HUD USER bearer token, needed for fair market rents.
    ///
    /// Set via COSTMAP_HUD_API_KEY environment variable.
    #[serde(default)]
    pub hud_api_key: Option<String>,

    /// BLS registration key. Optional; keyless access has lower quotas.
    ///
    /// Set via COSTMAP_BLS_API_KEY environment variable.
    #[serde(default)]
    pub bls_api_key: Option<String>,

    /// EIA API key, needed for energy prices.
    ///
    /// Set via COSTMAP_EIA_API_KEY environment variable.
    #[serde(default)]
    pub eia_api_key: Option<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via COSTMAP_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via COSTMAP_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-call upstream timeout in milliseconds.
    ///
    /// Set via COSTMAP_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_bea_base_url")]
    pub bea_base_url: String,

    #[serde(default = "default_hud_base_url")]
    pub hud_base_url: String,

    #[serde(default = "default_bls_base_url")]
    pub bls_base_url: String,

    #[serde(default = "default_eia_base_url")]
    pub eia_base_url: String,

    /// Fixed rate-limit window length in milliseconds.
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,

    /// Requests allowed per identifier per window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    /// How often expired rate-limit buckets are dropped.
    #[serde(default = "default_rate_limit_sweep_secs")]
    pub rate_limit_sweep_secs: u64,

    /// How often expired cache rows are deleted.
    #[serde(default = "default_cache_sweep_secs")]
    pub cache_sweep_secs: u64,

    /// Price parity year used when a request names none.
    ///
    /// Falls back to the current year minus two.
    #[serde(default)]
    pub price_parity_year: Option<i32>,

    /// Years of monthly price-index history to request.
    #[serde(default = "default_price_index_years")]
    pub price_index_years: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./costmap-cache.sqlite")
}

fn default_user_agent() -> String {
    "costmap/0.1".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_bea_base_url() -> String {
    "https://apps.bea.gov/api/data".into()
}

fn default_hud_base_url() -> String {
    "https://www.huduser.gov/hudapi/public".into()
}

fn default_bls_base_url() -> String {
    "https://api.bls.gov/publicAPI/v2/timeseries/data/".into()
}

fn default_eia_base_url() -> String {
    "https://api.eia.gov/v2".into()
}

fn default_rate_limit_window_ms() -> u64 {
    60_000
}

fn default_rate_limit_max_requests() -> u32 {
    60
}

fn default_rate_limit_sweep_secs() -> u64 {
    300
}

fn default_cache_sweep_secs() -> u64 {
    3_600
}

fn default_price_index_years() -> u32 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bea_api_key: None,
            hud_api_key: None,
            bls_api_key: None,
            eia_api_key: None,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            bea_base_url: default_bea_base_url(),
            hud_base_url: default_hud_base_url(),
            bls_base_url: default_bls_base_url(),
            eia_base_url: default_eia_base_url(),
            rate_limit_window_ms: default_rate_limit_window_ms(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            rate_limit_sweep_secs: default_rate_limit_sweep_secs(),
            cache_sweep_secs: default_cache_sweep_secs(),
            price_parity_year: None,
            price_index_years: default_price_index_years(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn rate_limit_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_secs)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `COSTMAP_`
    /// 2. TOML file from `COSTMAP_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("COSTMAP_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("COSTMAP_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// BEA user id, checked only when a price parity fetch actually needs it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_bea_api_key(&self) -> Result<&str, ConfigError> {
        require(&self.bea_api_key, "bea_api_key", "COSTMAP_BEA_API_KEY")
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_hud_api_key(&self) -> Result<&str, ConfigError> {
        require(&self.hud_api_key, "hud_api_key", "COSTMAP_HUD_API_KEY")
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_eia_api_key(&self) -> Result<&str, ConfigError> {
        require(&self.eia_api_key, "eia_api_key", "COSTMAP_EIA_API_KEY")
    }
}

fn require<'a>(value: &'a Option<String>, field: &str, env: &str) -> Result<&'a str, ConfigError> {
    value.as_deref().filter(|v| !v.trim().is_empty()).ok_or_else(|| ConfigError::Missing {
        field: field.into(),
        hint: format!("Set {env} environment variable"),
    })
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing { field, hint } => Error::MissingCredential { field, hint },
            other => Error::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./costmap-cache.sqlite"));
        assert_eq!(config.user_agent, "costmap/0.1");
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.rate_limit_window_ms, 60_000);
        assert_eq!(config.rate_limit_max_requests, 60);
        assert_eq!(config.price_index_years, 3);
        assert!(config.price_parity_year.is_none());
        assert!(config.bea_api_key.is_none());
        assert!(config.eia_base_url.starts_with("https://api.eia.gov"));
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(10_000));
        assert_eq!(config.cache_sweep_interval(), Duration::from_secs(3_600));
        assert_eq!(config.rate_limit_sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_require_key_missing() {
        let config = AppConfig::default();
        assert!(matches!(config.require_hud_api_key(), Err(ConfigError::Missing { .. })));

        let blank = AppConfig { eia_api_key: Some("  ".into()), ..Default::default() };
        assert!(blank.require_eia_api_key().is_err());
    }

    #[test]
    fn test_require_key_present() {
        let config = AppConfig { bea_api_key: Some("test-key".into()), ..Default::default() };
        assert_eq!(config.require_bea_api_key().unwrap(), "test-key");
    }

    #[test]
    fn test_missing_key_maps_to_internal_error() {
        let err: Error = AppConfig::default().require_eia_api_key().unwrap_err().into();
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(matches!(err, Error::MissingCredential { ref field, .. } if field == "eia_api_key"));
    }
}
