//! Configuration management for `CommuteSense`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings. Provider
//! credentials are checked here so a misconfigured process never starts
//! serving requests.

use crate::{CommuteSenseError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "COMMUTESENSE_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommuteSenseConfig {
    pub server: ServerConfig,
    pub geocoding: GeocodingConfig,
    pub routing: RoutingConfig,
    pub weather: WeatherConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Serve HTTPS when both paths are set
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// LocationIQ geocoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u32,
}

/// OpenRouteService directions settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_routing_base_url")]
    pub base_url: String,
    /// Routing profile, e.g. `driving-car` or `driving-hgv`
    #[serde(default = "default_routing_profile")]
    pub profile: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u32,
}

/// Open-Meteo weather settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u32,
    /// Distance between weather samples along the route, in meters
    #[serde(default = "default_sample_interval")]
    pub sample_interval_m: f64,
    /// Upper bound on weather lookups per report
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    /// Weather lookups allowed in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

/// Chat-completions (OpenRouter by default) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u32,
}

/// Whole-request behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,
    /// Retries per provider call on transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Cache directory; empty means the platform cache dir
    pub location: String,
    #[serde(default = "default_weather_ttl")]
    pub weather_ttl_minutes: u32,
    #[serde(default = "default_daily_ttl")]
    pub daily_ttl_hours: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// OTLP/HTTP collector endpoint for trace export
    pub otlp_endpoint: Option<String>,
}

// Default value functions
fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8000
}

fn default_geocoding_base_url() -> String {
    "https://us1.locationiq.com".to_string()
}

fn default_routing_base_url() -> String {
    "https://api.openrouteservice.org".to_string()
}

fn default_routing_profile() -> String {
    "driving-car".to_string()
}

fn default_weather_base_url() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_llm_model() -> String {
    "openai/gpt-oss-120b:free".to_string()
}

fn default_provider_timeout() -> u32 {
    10
}

fn default_llm_timeout() -> u32 {
    60
}

fn default_sample_interval() -> f64 {
    48_000.0
}

fn default_max_samples() -> usize {
    24
}

fn default_max_concurrency() -> usize {
    4
}

fn default_request_timeout() -> u32 {
    90
}

fn default_max_retries() -> u32 {
    1
}

fn default_cache_enabled() -> bool {
    true
}

fn default_weather_ttl() -> u32 {
    60
}

fn default_daily_ttl() -> u32 {
    6
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            tls: None,
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_geocoding_base_url(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_routing_base_url(),
            profile: default_routing_profile(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            timeout_seconds: default_provider_timeout(),
            sample_interval_m: default_sample_interval(),
            max_samples: default_max_samples(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_seconds: default_llm_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            location: String::new(),
            weather_ttl_minutes: default_weather_ttl(),
            daily_ttl_hours: default_daily_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl CommuteSenseConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from_path(explicit)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|p| p.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(FileFormat::Toml),
            );
        }

        // COMMUTESENSE_LLM__API_KEY -> llm.api_key
        builder = builder.add_source(
            Environment::with_prefix("COMMUTESENSE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| CommuteSenseError::config(format!("Failed to build configuration: {e}")))?;

        let mut config: CommuteSenseConfig = settings.try_deserialize().map_err(|e| {
            CommuteSenseError::config(format!("Failed to deserialize configuration: {e}"))
        })?;

        config.apply_credentials_from(|name| std::env::var(name).ok());
        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("commutesense").join("config.toml"))
    }

    /// Fill missing credentials from the provider-conventional variable names
    pub fn apply_credentials_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.geocoding.api_key.is_none() {
            self.geocoding.api_key = lookup("LOCATIONIQ_KEY");
        }
        if self.routing.api_key.is_none() {
            self.routing.api_key = lookup("OPENROUTESERVICE_API_KEY");
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup("OPENROUTER_AI_KEY");
        }
    }

    /// Apply default values to zeroed or blank fields
    pub fn apply_defaults(&mut self) {
        if self.geocoding.base_url.is_empty() {
            self.geocoding.base_url = default_geocoding_base_url();
        }
        if self.routing.base_url.is_empty() {
            self.routing.base_url = default_routing_base_url();
        }
        if self.routing.profile.is_empty() {
            self.routing.profile = default_routing_profile();
        }
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.llm.base_url.is_empty() {
            self.llm.base_url = default_llm_base_url();
        }
        if self.llm.model.is_empty() {
            self.llm.model = default_llm_model();
        }
        if self.weather.max_samples == 0 {
            self.weather.max_samples = default_max_samples();
        }
        if self.weather.max_concurrency == 0 {
            self.weather.max_concurrency = default_max_concurrency();
        }
        if self.pipeline.request_timeout_seconds == 0 {
            self.pipeline.request_timeout_seconds = default_request_timeout();
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
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// All three provider keys are mandatory
    pub fn validate_api_keys(&self) -> Result<()> {
        check_key("geocoding.api_key (LOCATIONIQ_KEY)", self.geocoding.api_key.as_deref())?;
        check_key(
            "routing.api_key (OPENROUTESERVICE_API_KEY)",
            self.routing.api_key.as_deref(),
        )?;
        check_key("llm.api_key (OPENROUTER_AI_KEY)", self.llm.api_key.as_deref())?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        for (name, seconds) in [
            ("geocoding", self.geocoding.timeout_seconds),
            ("routing", self.routing.timeout_seconds),
            ("weather", self.weather.timeout_seconds),
            ("llm", self.llm.timeout_seconds),
        ] {
            if seconds == 0 || seconds > 300 {
                return Err(CommuteSenseError::config(format!(
                    "{name} timeout must be between 1 and 300 seconds"
                )));
            }
        }

        if self.pipeline.request_timeout_seconds > 600 {
            return Err(CommuteSenseError::config(
                "Request timeout cannot exceed 600 seconds",
            ));
        }

        if self.pipeline.max_retries > 5 {
            return Err(CommuteSenseError::config(
                "Provider max retries cannot exceed 5",
            ));
        }

        if self.weather.sample_interval_m.is_nan() || self.weather.sample_interval_m < 1_000.0 {
            return Err(CommuteSenseError::config(
                "Weather sample interval must be at least 1000 m",
            ));
        }

        if self.weather.max_samples < 2 || self.weather.max_samples > 100 {
            return Err(CommuteSenseError::config(
                "Weather max samples must be between 2 and 100",
            ));
        }

        if self.weather.max_concurrency > 16 {
            return Err(CommuteSenseError::config(
                "Weather max concurrency cannot exceed 16",
            ));
        }

        if self.cache.weather_ttl_minutes > 24 * 60 || self.cache.daily_ttl_hours > 48 {
            return Err(CommuteSenseError::config(
                "Cache TTLs cannot exceed one day for weather and two days for daily forecasts",
            ));
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(CommuteSenseError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(CommuteSenseError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            )));
        }

        for (name, url) in [
            ("geocoding", &self.geocoding.base_url),
            ("routing", &self.routing.base_url),
            ("weather", &self.weather.base_url),
            ("llm", &self.llm.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(CommuteSenseError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                )));
            }
        }

        Ok(())
    }

    /// Directory the persistent cache lives in
    #[must_use]
    pub fn resolved_cache_path(&self) -> PathBuf {
        if !self.cache.location.is_empty() {
            return PathBuf::from(&self.cache.location);
        }
        dirs::cache_dir()
            .map(|dir| dir.join("commutesense"))
            .unwrap_or_else(|| PathBuf::from(".cache/commutesense"))
    }
}

fn check_key(name: &str, key: Option<&str>) -> Result<()> {
    match key.map(str::trim) {
        None | Some("") => Err(CommuteSenseError::config(format!(
            "Missing required credential {name}"
        ))),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn configured() -> CommuteSenseConfig {
        let mut config = CommuteSenseConfig::default();
        config.geocoding.api_key = Some("pk.test_geocoding_key".to_string());
        config.routing.api_key = Some("test_routing_key_123".to_string());
        config.llm.api_key = Some("sk-or-test-llm-key".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = CommuteSenseConfig::default();
        assert_eq!(config.weather.base_url, "https://api.open-meteo.com");
        assert_eq!(config.routing.profile, "driving-car");
        assert_eq!(config.weather.sample_interval_m, 48_000.0);
        assert_eq!(config.pipeline.max_retries, 1);
        assert_eq!(config.logging.level, "info");
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_missing_llm_key_is_fatal() {
        let mut config = configured();
        config.llm.api_key = None;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CommuteSenseError::Configuration { .. }));
        assert!(err.to_string().contains("llm.api_key"));
    }

    #[test]
    fn test_blank_key_is_rejected() {
        let mut config = configured();
        config.geocoding.api_key = Some("   ".to_string());
        assert!(config.validate_api_keys().is_err());
    }

    #[test]
    fn test_short_key_is_accepted() {
        let mut config = configured();
        config.routing.api_key = Some("abc".to_string());
        assert!(config.validate_api_keys().is_ok());
    }

    #[test]
    fn test_fully_configured_is_valid() {
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_legacy_credential_names() {
        let mut config = CommuteSenseConfig::default();
        config.routing.api_key = Some("explicit_routing_key".to_string());
        config.apply_credentials_from(|name| Some(format!("{name}-value")));

        assert_eq!(config.geocoding.api_key.as_deref(), Some("LOCATIONIQ_KEY-value"));
        // explicit settings win over fallbacks
        assert_eq!(config.routing.api_key.as_deref(), Some("explicit_routing_key"));
        assert_eq!(config.llm.api_key.as_deref(), Some("OPENROUTER_AI_KEY-value"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = configured();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = configured();
        config.weather.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("timeout must be between"));

        let mut config = configured();
        config.weather.sample_interval_m = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[geocoding]
api_key = "pk.file_geocoding_key"

[routing]
api_key = "file_routing_key"
profile = "driving-hgv"

[llm]
api_key = "sk-or-file-llm-key"
model = "some/model"

[weather]
max_samples = 12
"#,
        )
        .unwrap();

        let config = CommuteSenseConfig::load_from_path(Some(path)).unwrap();
        assert_eq!(config.routing.profile, "driving-hgv");
        assert_eq!(config.llm.model, "some/model");
        assert_eq!(config.weather.max_samples, 12);
        // untouched sections keep their defaults
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = CommuteSenseConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("commutesense"));
            assert!(path.to_string_lossy().ends_with("config.toml"));
        }
    }
}
