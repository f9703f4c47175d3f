//! Fetch orchestration: per-subject request lifecycle and keyed results.
//!
//! Every fetch is tagged with a monotonically increasing per-key token;
//! a completion whose token is older than the key's latest is discarded,
//! so state is last-issued-wins regardless of settle order. Failures leave
//! any previously stored payload in place (stale-but-available): consumers
//! may keep showing old data next to an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::client::{current_key, forecast_key, hourly_key, WeatherClient};
use crate::error::{ErrorKind, WeatherError};
use crate::types::{CityMatch, ForecastSeries, Subject, WeatherSnapshot};

/// Fetch lifecycle for one subject key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// Read-only view of one subject key's request lifecycle.
#[derive(Debug, Clone, Default)]
pub struct RequestState {
    pub status: FetchStatus,
    pub error: Option<ErrorKind>,
    pub last_updated: Option<Instant>,
}

#[derive(Debug, Default)]
struct Entry {
    state: RequestState,
    latest_token: u64,
}

#[derive(Debug, Default)]
struct Inner {
    states: HashMap<String, Entry>,
    currents: HashMap<String, WeatherSnapshot>,
    forecasts: HashMap<String, ForecastSeries>,
}

/// Tracks fetch lifecycle per subject key and merges successful payloads
/// into a keyed result store. Callers receive cloned read-only views.
#[derive(Debug)]
pub struct FetchOrchestrator {
    client: Arc<WeatherClient>,
    staleness: Duration,
    inner: Mutex<Inner>,
}

impl FetchOrchestrator {
    pub fn new(client: Arc<WeatherClient>) -> Self {
        let staleness = client.cache().ttl();
        Self {
            client,
            staleness,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Fetch current conditions for a city or a coordinate pair.
    pub async fn fetch_current(&self, subject: &Subject) -> Result<WeatherSnapshot, WeatherError> {
        let key = current_key(subject);
        let token = self.begin(&key);

        match self.client.current_conditions(subject).await {
            Ok(snapshot) => {
                if self.settle_ok(&key, token) {
                    self.inner.lock().currents.insert(key, snapshot.clone());
                }
                Ok(snapshot)
            }
            Err(err) => {
                self.settle_err(&key, token, err.kind());
                Err(err)
            }
        }
    }

    /// Fetch the 5-day forecast for a named city.
    pub async fn fetch_forecast(&self, city: &str) -> Result<ForecastSeries, WeatherError> {
        self.fetch_series(forecast_key(city), self.client.forecast(city))
            .await
    }

    /// Fetch the 24-hour view for a named city.
    pub async fn fetch_hourly(&self, city: &str) -> Result<ForecastSeries, WeatherError> {
        self.fetch_series(hourly_key(city), self.client.hourly_forecast(city))
            .await
    }

    /// Re-fetch current conditions only when the stored data is stale
    /// (never fetched, or older than the staleness threshold). Covers
    /// interest regained after a refresh timer was detached for longer
    /// than the TTL.
    pub async fn fetch_current_if_stale(
        &self,
        subject: &Subject,
    ) -> Result<Option<WeatherSnapshot>, WeatherError> {
        if !self.is_stale(&current_key(subject)) {
            return Ok(None);
        }
        self.fetch_current(subject).await.map(Some)
    }

    /// City search passthrough; results are transient and not tracked in
    /// request state.
    pub async fn search_cities(&self, query: &str) -> Result<Vec<CityMatch>, WeatherError> {
        self.client.search_cities(query).await
    }

    /// Lifecycle state for a subject key (`Idle` when never fetched).
    pub fn state(&self, key: &str) -> RequestState {
        self.inner
            .lock()
            .states
            .get(key)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    /// Last successful current-conditions payload for a subject key.
    pub fn snapshot(&self, key: &str) -> Option<WeatherSnapshot> {
        self.inner.lock().currents.get(key).cloned()
    }

    /// Last successful forecast/hourly series for a subject key.
    pub fn series(&self, key: &str) -> Option<ForecastSeries> {
        self.inner.lock().forecasts.get(key).cloned()
    }

    /// True when the key has no successful fetch newer than the staleness
    /// threshold.
    pub fn is_stale(&self, key: &str) -> bool {
        match self.state(key).last_updated {
            Some(at) => at.elapsed() > self.staleness,
            None => true,
        }
    }

    async fn fetch_series(
        &self,
        key: String,
        fetch: impl std::future::Future<Output = Result<ForecastSeries, WeatherError>>,
    ) -> Result<ForecastSeries, WeatherError> {
        let token = self.begin(&key);
        match fetch.await {
            Ok(series) => {
                if self.settle_ok(&key, token) {
                    self.inner.lock().forecasts.insert(key, series.clone());
                }
                Ok(series)
            }
            Err(err) => {
                self.settle_err(&key, token, err.kind());
                Err(err)
            }
        }
    }

    /// Mark the key pending, clear its error, and take the next token.
    fn begin(&self, key: &str) -> u64 {
        let mut inner = self.inner.lock();
        let entry = inner.states.entry(key.to_string()).or_default();
        entry.latest_token += 1;
        entry.state.status = FetchStatus::Pending;
        entry.state.error = None;
        entry.latest_token
    }

    /// Commit a success unless a newer fetch for the key was issued since.
    /// Returns whether the payload should be stored.
    fn settle_ok(&self, key: &str, token: u64) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.states.get_mut(key) else {
            return false;
        };
        if entry.latest_token != token {
            tracing::debug!(key, token, latest = entry.latest_token, "discarding stale completion");
            return false;
        }
        entry.state.status = FetchStatus::Succeeded;
        entry.state.error = None;
        entry.state.last_updated = Some(Instant::now());
        true
    }

    /// Commit a failure unless superseded. The keyed result store is left
    /// untouched either way.
    fn settle_err(&self, key: &str, token: u64, kind: ErrorKind) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.states.get_mut(key) else {
            return;
        };
        if entry.latest_token != token {
            tracing::debug!(key, token, latest = entry.latest_token, "discarding stale failure");
            return;
        }
        entry.state.status = FetchStatus::Failed;
        entry.state.error = Some(kind);
    }
}
