use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Unconfigured-key sentinel shipped in the default config file.
pub const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "SKYCAST_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// User-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Temperature unit preference. Payloads are canonical °C; conversion
/// happens at display time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn toggled(self) -> Self {
        match self {
            Self::Celsius => Self::Fahrenheit,
            Self::Fahrenheit => Self::Celsius,
        }
    }

    /// Convert a canonical-°C value into this unit.
    pub fn convert(self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// "12°C" / "54°F", rounded to the nearest degree.
    pub fn format(self, celsius: f64) -> String {
        let value = self.convert(celsius).round();
        match self {
            Self::Celsius => format!("{value}°C"),
            Self::Fahrenheit => format!("{value}°F"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Weather settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key (overridable via `SKYCAST_API_KEY`)
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Temperature unit preference
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,

    /// Cache TTL in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Refresh interval in seconds
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

fn default_api_key() -> String {
    PLACEHOLDER_API_KEY.to_string()
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_refresh_secs() -> u64 {
    60
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            temperature_unit: TemperatureUnit::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            refresh_secs: default_refresh_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            weather: WeatherConfig::default(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("skycast"))
        .unwrap_or_else(|| PathBuf::from(".skycast"))
}

impl Config {
    pub fn config_path() -> PathBuf {
        default_config_dir().join("config.toml")
    }

    /// Load configuration from file, creating default if it doesn't exist.
    /// `SKYCAST_API_KEY` in the environment overrides the configured key.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                config.weather.api_key = key;
            }
        }
        Ok(config)
    }

    /// Load configuration and validate it.
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        Ok((config, validation))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.weather.api_key.is_empty() || self.weather.api_key == PLACEHOLDER_API_KEY {
            // Fetches fail with a configuration error until corrected, but
            // the application can still start.
            result.add_warning(
                "weather.api_key",
                format!("not configured; set it in the config file or via {API_KEY_ENV}"),
            );
        }

        if self.weather.cache_ttl_secs == 0 {
            result.add_warning("weather.cache_ttl_secs", "zero TTL disables caching");
        }

        if self.weather.refresh_secs == 0 {
            result.add_error("weather.refresh_secs", "must be greater than zero");
        } else if self.weather.refresh_secs < 10 {
            result.add_warning(
                "weather.refresh_secs",
                "very short intervals may hit API rate limits",
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_default_config_is_valid_with_key_warning() {
        let config = Config::default();
        let validation = config.validate();

        assert!(validation.is_valid());
        assert!(validation
            .warnings
            .iter()
            .any(|w| w.field == "weather.api_key"));
    }

    #[test]
    fn test_zero_refresh_interval_is_an_error() {
        let mut config = Config::default();
        config.weather.refresh_secs = 0;

        let validation = config.validate();
        assert!(!validation.is_valid());
        assert!(validation.error_summary().contains("refresh_secs"));
    }

    #[test]
    fn test_short_refresh_interval_warns() {
        let mut config = Config::default();
        config.weather.api_key = "abc123".to_string();
        config.weather.refresh_secs = 5;

        let validation = config.validate();
        assert!(validation.is_valid());
        assert_eq!(validation.warnings.len(), 1);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.weather.api_key = "abc123".to_string();
        config.weather.temperature_unit = TemperatureUnit::Fahrenheit;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather.api_key, "abc123");
        assert_eq!(loaded.weather.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(loaded.weather.cache_ttl_secs, 60);
    }

    #[test]
    fn test_load_creates_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.weather.api_key, PLACEHOLDER_API_KEY);
        assert!(path.exists());
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(TemperatureUnit::Fahrenheit.convert(0.0), 32.0);
        assert_eq!(TemperatureUnit::Fahrenheit.convert(100.0), 212.0);
        assert_eq!(TemperatureUnit::Celsius.convert(12.3), 12.3);
    }

    #[test]
    fn test_unit_format() {
        assert_eq!(TemperatureUnit::Celsius.format(12.4), "12°C");
        assert_eq!(TemperatureUnit::Fahrenheit.format(0.0), "32°F");
    }

    #[test]
    fn test_unit_toggle() {
        assert_eq!(TemperatureUnit::Celsius.toggled(), TemperatureUnit::Fahrenheit);
        assert_eq!(TemperatureUnit::Fahrenheit.toggled(), TemperatureUnit::Celsius);
    }
}
