//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PRICEWATCH_*)
//! 2. TOML config file (if PRICEWATCH_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Revalidation options for one engine instance.
///
/// The defaults are the observed configuration of the prices page: no
/// automatic polling, no focus revalidation, a 10 second dedupe window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwrOptions {
    /// Automatic poll period. `Duration::ZERO` disables polling.
    pub refresh_interval: Duration,
    /// Whether regaining foreground triggers a revalidation request.
    pub revalidate_on_focus: bool,
    /// Minimum spacing between fetch initiations for the same key.
    pub deduping_interval: Duration,
}

impl Default for SwrOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::ZERO,
            revalidate_on_focus: false,
            deduping_interval: Duration::from_millis(default_deduping_interval_ms()),
        }
    }
}

impl SwrOptions {
    /// Whether automatic polling is enabled.
    pub fn polls(&self) -> bool {
        !self.refresh_interval.is_zero()
    }
}

/// Cache store sizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Maximum number of tracked keys. 0 means unbounded.
    pub max_entries: usize,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PRICEWATCH_*)
/// 2. TOML config file (if PRICEWATCH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Price-quote endpoint polled by the asset client.
    ///
    /// Set via PRICEWATCH_ENDPOINT environment variable.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PRICEWATCH_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via PRICEWATCH_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Automatic poll period in milliseconds, 0 disables polling.
    ///
    /// Set via PRICEWATCH_REFRESH_INTERVAL_MS environment variable.
    #[serde(default)]
    pub refresh_interval_ms: u64,

    /// Whether regaining focus revalidates.
    ///
    /// Set via PRICEWATCH_REVALIDATE_ON_FOCUS environment variable.
    #[serde(default)]
    pub revalidate_on_focus: bool,

    /// Minimum milliseconds between fetch initiations for the same key.
    ///
    /// Set via PRICEWATCH_DEDUPING_INTERVAL_MS environment variable.
    #[serde(default = "default_deduping_interval_ms")]
    pub deduping_interval_ms: u64,

    /// Maximum number of cached keys, 0 for unbounded.
    ///
    /// Set via PRICEWATCH_MAX_ENTRIES environment variable.
    #[serde(default)]
    pub max_entries: usize,
}

fn default_endpoint() -> String {
    "https://api.coincap.io/v2/assets?limit=5".into()
}

fn default_user_agent() -> String {
    "pricewatch/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_deduping_interval_ms() -> u64 {
    10_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            refresh_interval_ms: 0,
            revalidate_on_focus: false,
            deduping_interval_ms: default_deduping_interval_ms(),
            max_entries: 0,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Revalidation options derived from this configuration.
    pub fn swr_options(&self) -> SwrOptions {
        SwrOptions {
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            revalidate_on_focus: self.revalidate_on_focus,
            deduping_interval: Duration::from_millis(self.deduping_interval_ms),
        }
    }

    /// Store sizing derived from this configuration.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions { max_entries: self.max_entries }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PRICEWATCH_`
    /// 2. TOML file from `PRICEWATCH_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("PRICEWATCH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PRICEWATCH_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into()),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.endpoint, "https://api.coincap.io/v2/assets?limit=5");
        assert_eq!(config.user_agent, "pricewatch/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.refresh_interval_ms, 0);
        assert!(!config.revalidate_on_focus);
        assert_eq!(config.deduping_interval_ms, 10_000);
        assert_eq!(config.max_entries, 0);
    }

    #[test]
    fn test_default_swr_options_match_observed_page() {
        let options = AppConfig::default().swr_options();
        assert_eq!(options, SwrOptions::default());
        assert_eq!(options.deduping_interval, Duration::from_secs(10));
        assert!(!options.polls());
        assert!(!options.revalidate_on_focus);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_load_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("pricewatch.toml", "deduping_interval_ms = 2000\nrefresh_interval_ms = 5000\n")?;
            jail.set_env("PRICEWATCH_CONFIG_FILE", "pricewatch.toml");
            jail.set_env("PRICEWATCH_REFRESH_INTERVAL_MS", "30000");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.deduping_interval_ms, 2000);
            assert_eq!(config.refresh_interval_ms, 30_000);
            assert!(config.swr_options().polls());
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("PRICEWATCH_TIMEOUT_MS", "5");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
            Ok(())
        });
    }
}
