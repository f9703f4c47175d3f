pub mod config;
pub mod store;

pub use config::{Config, TemperatureUnit, ValidationResult, WeatherConfig};
pub use store::{PrefsStore, SavedCity, MAX_RECENT_SEARCHES};

use anyhow::Result;

/// Initialize the core application
pub fn init() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Skycast core initialized");
    Ok(())
}
