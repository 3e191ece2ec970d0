//! Configuration management for `TravelPack`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::TravelPackError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `TravelPack` application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelPackConfig {
    /// National Weather Service API configuration
    pub weather: WeatherConfig,
    /// Geocoding API configuration
    pub geocoding: GeocodingConfig,
    /// Chat-completion provider configuration
    pub llm: LlmConfig,
    /// Embedding model configuration
    pub embedding: EmbeddingConfig,
    /// Packing-guideline corpus configuration
    pub knowledge: KnowledgeConfig,
    /// Query interpretation settings
    pub agent: AgentConfig,
    /// Embedding cache configuration
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL for the NWS API
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_weather_timeout")]
    pub timeout_seconds: u32,
    /// User-Agent sent with every request (NWS rejects anonymous clients)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Number of days, starting at the target date, summarized from the forecast
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

/// Geocoding configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Base URL for the Open-Meteo geocoding API
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_geocoding_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of candidates requested per lookup
    #[serde(default = "default_geocoding_max_results")]
    pub max_results: u32,
    /// ISO 3166-1 alpha-2 codes accepted by the region check
    #[serde(default = "default_supported_country_codes")]
    pub supported_country_codes: Vec<String>,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (only "openai" is supported)
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Chat model
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Sampling temperature
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    /// Upper bound on completion tokens
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u32,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Inline API key; takes precedence over `api_key_env`
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Maximum passages per embeddings request
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: u32,
}

/// Knowledge corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Corpus file; the built-in corpus is used when unset
    #[serde(default)]
    pub corpus_path: Option<String>,
    /// Number of passages retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

/// Query interpretation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// "llm" or "heuristic"
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether corpus embeddings are persisted between runs
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Cache TTL in hours
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

// Default value functions
fn default_weather_base_url() -> String {
    "https://api.weather.gov".to_string()
}

fn default_weather_timeout() -> u32 {
    30
}

fn default_user_agent() -> String {
    format!("TravelPack/{} (packing assistant)", env!("CARGO_PKG_VERSION"))
}

fn default_window_days() -> u32 {
    2
}

fn default_geocoding_base_url() -> String {
    "https://geocoding-api.open-meteo.com/v1".to_string()
}

fn default_geocoding_timeout() -> u32 {
    15
}

fn default_geocoding_max_results() -> u32 {
    5
}

fn default_supported_country_codes() -> Vec<String> {
    vec!["US".to_string()]
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_temperature() -> f32 {
    0.7
}

fn default_llm_max_tokens() -> u32 {
    1200
}

fn default_llm_timeout() -> u32 {
    60
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_batch_size() -> u32 {
    64
}

fn default_top_k() -> u32 {
    4
}

fn default_interpreter() -> String {
    "llm".to_string()
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u32 {
    24 * 30
}

fn default_cache_location() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("travelpack").to_string_lossy().into_owned())
        .unwrap_or_else(|| "~/.cache/travelpack".to_string())
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            timeout_seconds: default_weather_timeout(),
            user_agent: default_user_agent(),
            window_days: default_window_days(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_base_url(),
            timeout_seconds: default_geocoding_timeout(),
            max_results: default_geocoding_max_results(),
            supported_country_codes: default_supported_country_codes(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_seconds: default_llm_timeout(),
            api_key_env: default_api_key_env(),
            api_key: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_embedding_batch_size(),
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            top_k: default_top_k(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
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

impl LlmConfig {
    /// Resolve the API key from the inline value or the configured environment variable
    pub fn get_api_key(&self) -> std::result::Result<String, TravelPackError> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.clone());
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(TravelPackError::config(format!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            ))),
        }
    }
}

impl CacheConfig {
    /// Cache directory with a leading `~/` expanded to the home directory
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

impl TravelPackConfig {
    /// Load configuration from specified path
    ///
    /// An explicitly given path must exist; the default path is optional.
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(TravelPackError::config(format!(
                        "Config file not found: {}",
                        path.display()
                    ))
                    .into());
                }
                builder = builder.add_source(
                    File::from(path)
                        .required(true)
                        .format(config::FileFormat::Toml),
                );
            }
            None => {
                if let Some(path) = Self::get_config_path().filter(|p| p.exists()) {
                    builder = builder.add_source(
                        File::from(path)
                            .required(false)
                            .format(config::FileFormat::Toml),
                    );
                }
            }
        }

        // Environment overrides, e.g. TRAVELPACK_LLM__MODEL=gpt-4o
        builder = builder.add_source(
            Environment::with_prefix("TRAVELPACK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("geocoding.supported_country_codes"),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: TravelPackConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("travelpack").join("config.toml"))
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_weather_timeout();
        }
        if self.weather.user_agent.is_empty() {
            self.weather.user_agent = default_user_agent();
        }
        if self.weather.window_days == 0 {
            self.weather.window_days = default_window_days();
        }
        if self.geocoding.base_url.is_empty() {
            self.geocoding.base_url = default_geocoding_base_url();
        }
        if self.geocoding.timeout_seconds == 0 {
            self.geocoding.timeout_seconds = default_geocoding_timeout();
        }
        if self.geocoding.max_results == 0 {
            self.geocoding.max_results = default_geocoding_max_results();
        }
        if self.geocoding.supported_country_codes.is_empty() {
            self.geocoding.supported_country_codes = default_supported_country_codes();
        }
        if self.llm.base_url.is_empty() {
            self.llm.base_url = default_llm_base_url();
        }
        if self.llm.model.is_empty() {
            self.llm.model = default_llm_model();
        }
        if self.llm.timeout_seconds == 0 {
            self.llm.timeout_seconds = default_llm_timeout();
        }
        if self.llm.max_tokens == 0 {
            self.llm.max_tokens = default_llm_max_tokens();
        }
        if self.embedding.model.is_empty() {
            self.embedding.model = default_embedding_model();
        }
        if self.embedding.batch_size == 0 {
            self.embedding.batch_size = default_embedding_batch_size();
        }
        if self.knowledge.top_k == 0 {
            self.knowledge.top_k = default_top_k();
        }
        if self.agent.interpreter.is_empty() {
            self.agent.interpreter = default_interpreter();
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
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.weather.timeout_seconds > 300 {
            return Err(
                TravelPackError::config("Weather API timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.weather.window_days > 7 {
            return Err(TravelPackError::config(
                "Forecast window cannot exceed 7 days (NWS forecast horizon)",
            )
            .into());
        }

        if self.geocoding.max_results > 100 {
            return Err(
                TravelPackError::config("Geocoding max results cannot exceed 100").into(),
            );
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(
                TravelPackError::config("LLM temperature must be between 0.0 and 2.0").into(),
            );
        }

        if self.llm.timeout_seconds > 600 {
            return Err(TravelPackError::config("LLM timeout cannot exceed 600 seconds").into());
        }

        if self.embedding.batch_size > 2048 {
            return Err(
                TravelPackError::config("Embedding batch size cannot exceed 2048").into(),
            );
        }

        if self.knowledge.top_k > 20 {
            return Err(TravelPackError::config("Knowledge top_k cannot exceed 20").into());
        }

        if self.cache.ttl_hours > 24 * 365 {
            return Err(
                TravelPackError::config("Cache TTL cannot exceed 8760 hours (1 year)").into(),
            );
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(TravelPackError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(TravelPackError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let valid_interpreters = ["llm", "heuristic"];
        if !valid_interpreters.contains(&self.agent.interpreter.as_str()) {
            return Err(TravelPackError::config(format!(
                "Invalid interpreter '{}'. Must be one of: {}",
                self.agent.interpreter,
                valid_interpreters.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Weather API", &self.weather.base_url),
            ("Geocoding API", &self.geocoding.base_url),
            ("LLM API", &self.llm.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(TravelPackError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        if self
            .geocoding
            .supported_country_codes
            .iter()
            .any(|code| code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()))
        {
            return Err(TravelPackError::config(
                "Supported country codes must be ISO 3166-1 alpha-2 codes",
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TravelPackConfig::default();
        assert_eq!(config.weather.base_url, "https://api.weather.gov");
        assert_eq!(config.weather.timeout_seconds, 30);
        assert_eq!(config.weather.window_days, 2);
        assert_eq!(config.geocoding.supported_country_codes, vec!["US"]);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.knowledge.top_k, 4);
        assert_eq!(config.agent.interpreter, "llm");
        assert!(config.llm.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = TravelPackConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = TravelPackConfig::default();
        config.weather.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));
    }

    #[test]
    fn test_config_validation_interpreter() {
        let mut config = TravelPackConfig::default();
        config.agent.interpreter = "oracle".to_string();
        assert!(config.validate().is_err());
        config.agent.interpreter = "heuristic".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_country_codes() {
        let mut config = TravelPackConfig::default();
        config.geocoding.supported_country_codes = vec!["USA".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_defaults_fills_empty_values() {
        let mut config = TravelPackConfig::default();
        config.llm.model = String::new();
        config.knowledge.top_k = 0;
        config.apply_defaults();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.knowledge.top_k, 4);
    }

    #[test]
    fn test_inline_api_key_wins() {
        let mut config = TravelPackConfig::default();
        config.llm.api_key = Some("sk-inline".to_string());
        config.llm.api_key_env = "TRAVELPACK_TEST_UNSET_KEY_VAR".to_string();
        assert_eq!(config.llm.get_api_key().unwrap(), "sk-inline");
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let mut config = TravelPackConfig::default();
        config.llm.api_key_env = "TRAVELPACK_TEST_DEFINITELY_UNSET".to_string();
        let err = config.llm.get_api_key().unwrap_err();
        assert!(matches!(err, TravelPackError::Config { .. }));
        assert!(err.to_string().contains("TRAVELPACK_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[llm]
model = "gpt-4o"
temperature = 0.2

[knowledge]
top_k = 6

[agent]
interpreter = "heuristic"
"#
        )
        .unwrap();

        let config = TravelPackConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.knowledge.top_k, 6);
        assert_eq!(config.agent.interpreter, "heuristic");
        // Untouched sections keep their defaults
        assert_eq!(config.weather.base_url, "https://api.weather.gov");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = TravelPackConfig::load_from_path(Some(PathBuf::from(
            "/definitely/not/here/travelpack.toml",
        )));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = TravelPackConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("travelpack"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }

    #[test]
    fn test_cache_location_tilde_expansion() {
        let cache = CacheConfig {
            enabled: true,
            ttl_hours: 1,
            location: "~/somewhere/cache".to_string(),
        };
        let resolved = cache.resolved_location();
        if dirs::home_dir().is_some() {
            assert!(!resolved.to_string_lossy().starts_with('~'));
        }
        assert!(resolved.ends_with("somewhere/cache"));
    }
}
