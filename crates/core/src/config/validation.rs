//! Post-load checks on `AppConfig`.

use crate::config::AppConfig;
use thiserror::Error;

/// Errors from loading, validating, or reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn nonzero(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 { Err(invalid(field, "must be greater than 0")) } else { Ok(()) }
}

const TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=300_000;
const PRICE_INDEX_YEARS: std::ops::RangeInclusive<u32> = 1..=20;
const FIRST_PRICE_PARITY_YEAR: i32 = 2008;

impl AppConfig {
    /// Check loaded values.
    ///
    /// Absent API keys are not an error here; only the feeds that need a key
    /// fail, and only on a cache miss. They are logged once as a warning.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !TIMEOUT_RANGE_MS.contains(&self.timeout_ms) {
            return Err(invalid(
                "timeout_ms",
                format!("must be between {} and {}", TIMEOUT_RANGE_MS.start(), TIMEOUT_RANGE_MS.end()),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        nonzero("rate_limit_window_ms", self.rate_limit_window_ms)?;
        nonzero("rate_limit_max_requests", u64::from(self.rate_limit_max_requests))?;
        nonzero("rate_limit_sweep_secs", self.rate_limit_sweep_secs)?;
        nonzero("cache_sweep_secs", self.cache_sweep_secs)?;

        if !PRICE_INDEX_YEARS.contains(&self.price_index_years) {
            return Err(invalid("price_index_years", "must be between 1 and 20"));
        }
        if let Some(year) = self.price_parity_year
            && year < FIRST_PRICE_PARITY_YEAR
        {
            return Err(invalid("price_parity_year", format!("price parities start in {FIRST_PRICE_PARITY_YEAR}")));
        }

        let missing: Vec<&str> = [
            ("bea_api_key", &self.bea_api_key),
            ("hud_api_key", &self.hud_api_key),
            ("eia_api_key", &self.eia_api_key),
        ]
        .into_iter()
        .filter(|(_, key)| key.as_deref().is_none_or(|k| k.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            tracing::warn!(?missing, "upstream API keys not set; feeds needing them fail on cache miss");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_field(config: AppConfig) -> Option<String> {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_timeout_bounds() {
        for ok in [100, 300_000] {
            assert!(AppConfig { timeout_ms: ok, ..Default::default() }.validate().is_ok());
        }
        for bad in [0, 99, 300_001] {
            assert_eq!(invalid_field(AppConfig { timeout_ms: bad, ..Default::default() }).as_deref(), Some("timeout_ms"));
        }
    }

    #[test]
    fn test_blank_user_agent() {
        let config = AppConfig { user_agent: "  ".into(), ..Default::default() };
        assert_eq!(invalid_field(config).as_deref(), Some("user_agent"));
    }

    #[test]
    fn test_zero_rate_limit_and_sweep_settings() {
        let cases = [
            ("rate_limit_window_ms", AppConfig { rate_limit_window_ms: 0, ..Default::default() }),
            ("rate_limit_max_requests", AppConfig { rate_limit_max_requests: 0, ..Default::default() }),
            ("rate_limit_sweep_secs", AppConfig { rate_limit_sweep_secs: 0, ..Default::default() }),
            ("cache_sweep_secs", AppConfig { cache_sweep_secs: 0, ..Default::default() }),
        ];
        for (field, config) in cases {
            assert_eq!(invalid_field(config).as_deref(), Some(field));
        }
    }

    #[test]
    fn test_year_settings() {
        assert!(invalid_field(AppConfig { price_index_years: 0, ..Default::default() }).is_some());
        assert!(invalid_field(AppConfig { price_index_years: 21, ..Default::default() }).is_some());
        assert!(AppConfig { price_index_years: 20, ..Default::default() }.validate().is_ok());

        let config = AppConfig { price_parity_year: Some(1999), ..Default::default() };
        assert_eq!(invalid_field(config).as_deref(), Some("price_parity_year"));
        assert!(AppConfig { price_parity_year: Some(2008), ..Default::default() }.validate().is_ok());
    }

    #[test]
    fn test_missing_keys_do_not_fail_validation() {
        let config = AppConfig { bea_api_key: None, hud_api_key: Some(String::new()), ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
