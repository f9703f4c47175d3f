//! Weather data-acquisition layer for Skycast
//!
//! TTL-cached gateway to a remote weather API, per-subject fetch
//! orchestration, tiered geolocation with IP fallback, and reference-counted
//! periodic refresh.

pub mod cache;
pub mod client;
pub mod error;
pub mod fetch;
pub mod location;
pub mod refresh;
pub mod types;

pub use cache::CacheStore;
pub use client::{current_key, forecast_key, hourly_key, WeatherClient};
pub use error::{ErrorKind, LocationError, WeatherError};
pub use fetch::{FetchOrchestrator, FetchStatus, RequestState};
pub use location::{
    GeoFailure, GeoProvider, IpLocator, LocateOptions, LocationResolver, NoGeoProvider,
    ResolverState,
};
pub use refresh::{FetchFn, RefreshHandle, RefreshScheduler, DEFAULT_REFRESH_INTERVAL};
pub use types::{CityMatch, Coordinates, ForecastSample, ForecastSeries, Subject, WeatherSnapshot};
