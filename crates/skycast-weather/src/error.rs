//! Weather and geolocation error types.

use thiserror::Error;

/// Failures raised by the weather gateway.
#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("API key not configured: {0}")]
    Configuration(String),

    #[error("Invalid API key")]
    Auth,

    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl WeatherError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(_) => {
                "API key not configured. Add your OpenWeatherMap API key to the config file."
                    .to_string()
            }
            Self::Auth => {
                "Invalid API key. New keys can take several minutes to activate; wait and retry."
                    .to_string()
            }
            Self::NotFound(_) => "Location not found".to_string(),
            Self::RateLimited => "Too many requests. Please wait a moment.".to_string(),
            Self::Api(msg) => format!("Weather service error: {msg}"),
            Self::Parse(_) => "Unexpected response from the weather service".to_string(),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
        }
    }

    /// Whether a manual retry of the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Network(_) | Self::Api(_))
    }

    /// Cloneable classification stored in per-subject request state.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(msg) => ErrorKind::Configuration(msg.clone()),
            Self::Auth => ErrorKind::Auth,
            Self::NotFound(msg) => ErrorKind::NotFound(msg.clone()),
            Self::RateLimited => ErrorKind::RateLimited,
            Self::Api(msg) => ErrorKind::Api(msg.clone()),
            Self::Parse(msg) => ErrorKind::Parse(msg.clone()),
            Self::Network(e) => ErrorKind::Network(e.to_string()),
        }
    }
}

/// Cloneable mirror of [`WeatherError`] kept in `RequestState`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("API key not configured: {0}")]
    Configuration(String),
    #[error("Invalid API key")]
    Auth,
    #[error("Location not found: {0}")]
    NotFound(String),
    #[error("Too many requests")]
    RateLimited,
    #[error("API error: {0}")]
    Api(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Network error: {0}")]
    Network(String),
}

/// Failures raised by the location resolver once its tier chain is
/// exhausted (or terminated early).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable")]
    PositionUnavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Geolocation is not supported on this device")]
    Unsupported,

    #[error("IP location lookup failed: {0}")]
    IpLookup(String),
}

impl LocationError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Location permission denied. Allow location access in your settings.".to_string()
            }
            Self::PositionUnavailable => {
                "Unable to determine your location. Location services may be unavailable."
                    .to_string()
            }
            Self::Timeout => "Location request timed out. Please try again.".to_string(),
            Self::Unsupported => "Geolocation is not supported on this device.".to_string(),
            Self::IpLookup(_) => {
                "Unable to determine your location. Search for your city manually.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_auth_message_mentions_key_activation_delay() {
        let msg = WeatherError::Auth.user_message();
        assert!(msg.contains("minutes"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(WeatherError::RateLimited.is_retryable());
        assert!(WeatherError::Api("500".into()).is_retryable());
        assert!(!WeatherError::Auth.is_retryable());
        assert!(!WeatherError::NotFound("x".into()).is_retryable());
        assert!(!WeatherError::Configuration("missing".into()).is_retryable());
    }

    #[test]
    fn test_kind_round_trip() {
        assert_eq!(WeatherError::Auth.kind(), ErrorKind::Auth);
        assert_eq!(
            WeatherError::NotFound("city not found".into()).kind(),
            ErrorKind::NotFound("city not found".into())
        );
        assert_eq!(WeatherError::RateLimited.kind(), ErrorKind::RateLimited);
    }

    #[test]
    fn test_ip_failure_directs_manual_search() {
        let msg = LocationError::IpLookup("no coordinates".into()).user_message();
        assert!(msg.contains("manually"));
    }
}
