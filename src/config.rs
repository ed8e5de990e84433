//! Configuration management for the forecast-delta application
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::ForecastDeltaError;
use crate::models::ForecastProduct;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for the forecast-delta application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastDeltaConfig {
    /// Forecast API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Retry policy for the comparison
    #[serde(default)]
    pub retry: RetryConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Default application settings
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Forecast API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Public-data service key (decoded form)
    pub service_key: Option<String>,
    /// Base URL of the village forecast service
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// HTTP client timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u32,
}

/// Retry settings for each comparison leg
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per leg before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Timeout of a single attempt in milliseconds
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    /// Pause between attempts in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Attempts guaranteed after shifting to an earlier issuance
    #[serde(default = "default_malformed_min_remaining")]
    pub malformed_min_remaining: u32,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Geocoding cache TTL in hours
    #[serde(default = "default_cache_ttl")]
    pub ttl_hours: u32,
    /// Cache directory location
    #[serde(default = "default_cache_location")]
    pub location: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Default application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Forecast product compared when none is given
    #[serde(default)]
    pub product: ForecastProduct,
}

// Default value functions
fn default_api_base_url() -> String {
    "https://apis.data.go.kr/1360000/VilageFcstInfoService_2.0".to_string()
}

fn default_api_timeout() -> u32 {
    10
}

fn default_max_attempts() -> u32 {
    crate::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_attempt_timeout_ms() -> u64 {
    crate::retry::DEFAULT_ATTEMPT_TIMEOUT_MS
}

fn default_backoff_ms() -> u64 {
    crate::retry::DEFAULT_BACKOFF_MS
}

fn default_malformed_min_remaining() -> u32 {
    crate::retry::DEFAULT_MALFORMED_MIN_REMAINING
}

fn default_cache_ttl() -> u32 {
    24 * 30
}

fn default_cache_location() -> String {
    "~/.cache/forecast-delta".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            service_key: None,
            base_url: default_api_base_url(),
            timeout_seconds: default_api_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            backoff_ms: default_backoff_ms(),
            malformed_min_remaining: default_malformed_min_remaining(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_cache_ttl(),
            location: default_cache_location(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl RetryConfig {
    /// Build the orchestrator's retry policy from these settings
    #[must_use]
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.attempt_timeout_ms),
            Duration::from_millis(self.backoff_ms),
        )
        .with_malformed_min_remaining(self.malformed_min_remaining)
    }

    /// Check the retry limits; also applied to command-line overrides
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ForecastDeltaError::config("Max attempts must be at least 1").into());
        }

        if self.max_attempts > 10 {
            return Err(ForecastDeltaError::config("Max attempts cannot exceed 10").into());
        }

        if self.malformed_min_remaining > 5 {
            return Err(ForecastDeltaError::config(
                "Attempts kept after an issuance shift cannot exceed 5",
            )
            .into());
        }

        if self.attempt_timeout_ms > 60_000 {
            return Err(
                ForecastDeltaError::config("Attempt timeout cannot exceed 60000 ms").into(),
            );
        }

        if self.backoff_ms > 60_000 {
            return Err(ForecastDeltaError::config("Backoff cannot exceed 60000 ms").into());
        }

        Ok(())
    }
}

impl CacheConfig {
    /// Cache directory with a leading `~` expanded
    #[must_use]
    pub fn resolved_location(&self) -> PathBuf {
        match self.location.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.location)),
            None => PathBuf::from(&self.location),
        }
    }
}

impl ForecastDeltaConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. FORECAST_DELTA_API__SERVICE_KEY
        builder = builder.add_source(
            Environment::with_prefix("FORECAST_DELTA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: ForecastDeltaConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("forecast-delta").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.api.base_url.is_empty() {
            self.api.base_url = default_api_base_url();
        }
        if self.api.timeout_seconds == 0 {
            self.api.timeout_seconds = default_api_timeout();
        }
        if self.retry.max_attempts == 0 {
            self.retry.max_attempts = default_max_attempts();
        }
        if self.retry.attempt_timeout_ms == 0 {
            self.retry.attempt_timeout_ms = default_attempt_timeout_ms();
        }
        if self.cache.ttl_hours == 0 {
            self.cache.ttl_hours = default_cache_ttl();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_service_key()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate the service key when one is configured
    pub fn validate_service_key(&self) -> Result<()> {
        // The key is only needed for `compare`, so absence is fine here
        if let Some(key) = &self.api.service_key {
            if key.trim().is_empty() {
                return Err(ForecastDeltaError::config(
                    "Service key cannot be empty if provided. Either remove it or provide a valid key.",
                )
                .into());
            }

            if key.len() < 16 {
                return Err(ForecastDeltaError::config(
                    "Service key appears to be invalid (too short). Please check your key.",
                )
                .into());
            }
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.api.timeout_seconds > 300 {
            return Err(
                ForecastDeltaError::config("API timeout cannot exceed 300 seconds").into(),
            );
        }

        self.retry.validate()?;

        if self.cache.ttl_hours > 24 * 365 {
            return Err(ForecastDeltaError::config("Cache TTL cannot exceed one year").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(ForecastDeltaError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(ForecastDeltaError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(ForecastDeltaError::config(
                "Forecast API base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        Ok(())
    }
}
