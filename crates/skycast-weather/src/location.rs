//! Tiered geolocation: precise device fix, degraded device fix, IP estimate.
//!
//! Each tier is a pure async step returning a discriminated outcome; a
//! driver loop composes them. Permission denial and timeout at the precise
//! tier terminate the chain directly (the cause is not accuracy-related);
//! only `PositionUnavailable`, a degraded-tier failure, or an absent device
//! capability reach the IP fallback.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::LocationError;
use crate::fetch::FetchOrchestrator;
use crate::types::{Coordinates, Subject};

const IP_LOOKUP_URL: &str = "http://ip-api.com/json";
const IP_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

const PRECISE_TIMEOUT: Duration = Duration::from_secs(10);
const DEGRADED_TIMEOUT: Duration = Duration::from_secs(15);
/// Degraded tier accepts a cached device position up to this old.
const DEGRADED_MAX_AGE: Duration = Duration::from_secs(300);

/// Options handed to the device geolocation capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocateOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl LocateOptions {
    fn precise() -> Self {
        Self {
            high_accuracy: true,
            timeout: PRECISE_TIMEOUT,
            maximum_age: Duration::ZERO,
        }
    }

    fn degraded() -> Self {
        Self {
            high_accuracy: false,
            timeout: DEGRADED_TIMEOUT,
            maximum_age: DEGRADED_MAX_AGE,
        }
    }
}

/// Failure reasons reported by a device geolocation capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoFailure {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

/// Device geolocation capability. Implementations enforce the timeout and
/// cached-position age from [`LocateOptions`].
pub trait GeoProvider {
    fn locate(
        &self,
        opts: LocateOptions,
    ) -> impl std::future::Future<Output = Result<Coordinates, GeoFailure>>;
}

/// Ranked strategies in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Precise,
    Degraded,
    IpFallback,
}

/// Discriminated outcome of one tier attempt.
#[derive(Debug, Clone, PartialEq)]
enum TierOutcome {
    Success(Coordinates),
    Retry(Tier),
    Fail(LocationError),
}

/// Resolver lifecycle, observable while a resolution is in flight.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResolverState {
    #[default]
    Idle,
    RequestingPrecise,
    RequestingDegraded,
    RequestingIp,
    Resolved(Coordinates),
    Failed(LocationError),
}

/// External IP-geolocation lookup, used only after the device tiers are
/// unavailable or exhausted.
#[derive(Debug)]
pub struct IpLocator {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    #[serde(default)]
    status: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpLocator {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(IP_LOOKUP_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: IP_LOOKUP_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn new_with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// Estimate coordinates from the caller's network address.
    pub async fn locate(&self) -> Result<Coordinates, LocationError> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| LocationError::IpLookup(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocationError::IpLookup(format!(
                "lookup returned {}",
                response.status()
            )));
        }

        let body: IpLookupResponse = response
            .json()
            .await
            .map_err(|e| LocationError::IpLookup(e.to_string()))?;

        if body.status.as_deref() == Some("fail") {
            return Err(LocationError::IpLookup("lookup reported failure".to_string()));
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates { lat, lon }),
            _ => Err(LocationError::IpLookup("no coordinates in response".to_string())),
        }
    }
}

impl Default for IpLocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves a geographic position through the ordered tier chain and hands
/// the result to the fetch orchestrator as a coordinate-keyed fetch.
#[derive(Debug)]
pub struct LocationResolver<G> {
    provider: Option<G>,
    ip: IpLocator,
    orchestrator: Arc<FetchOrchestrator>,
    state: Mutex<ResolverState>,
}

/// Marker for hosts with no device geolocation capability at all.
#[derive(Debug, Clone, Copy)]
pub struct NoGeoProvider;

impl GeoProvider for NoGeoProvider {
    async fn locate(&self, _opts: LocateOptions) -> Result<Coordinates, GeoFailure> {
        Err(GeoFailure::PositionUnavailable)
    }
}

impl LocationResolver<NoGeoProvider> {
    /// Resolver for hosts without device geolocation; resolution goes
    /// straight to the IP tier.
    pub fn without_device(ip: IpLocator, orchestrator: Arc<FetchOrchestrator>) -> Self {
        Self::new(None, ip, orchestrator)
    }
}

impl<G: GeoProvider> LocationResolver<G> {
    pub fn new(provider: Option<G>, ip: IpLocator, orchestrator: Arc<FetchOrchestrator>) -> Self {
        Self {
            provider,
            ip,
            orchestrator,
            state: Mutex::new(ResolverState::Idle),
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state.lock().clone()
    }

    /// Drive the tier chain to completion. On success the coordinates are
    /// also handed to the orchestrator for a coordinate-keyed fetch, whose
    /// outcome lands in that subject's request state.
    pub async fn resolve(&self) -> Result<Coordinates, LocationError> {
        let mut tier = if self.provider.is_some() {
            Tier::Precise
        } else {
            tracing::info!("device geolocation unavailable, using IP fallback");
            Tier::IpFallback
        };

        loop {
            self.enter(tier);
            let outcome = match tier {
                Tier::Precise => self.try_precise().await,
                Tier::Degraded => self.try_degraded().await,
                Tier::IpFallback => self.try_ip().await,
            };

            match outcome {
                TierOutcome::Success(coords) => {
                    *self.state.lock() = ResolverState::Resolved(coords);
                    tracing::info!(lat = coords.lat, lon = coords.lon, "location resolved");
                    if let Err(e) = self
                        .orchestrator
                        .fetch_current(&Subject::from(coords))
                        .await
                    {
                        // Captured in the subject's request state; the
                        // resolution itself still succeeded.
                        tracing::warn!(error = %e, "weather fetch for resolved location failed");
                    }
                    return Ok(coords);
                }
                TierOutcome::Retry(next) => {
                    tracing::info!(from = ?tier, to = ?next, "falling back to next location tier");
                    tier = next;
                }
                TierOutcome::Fail(err) => {
                    tracing::warn!(tier = ?tier, error = %err, "location resolution failed");
                    *self.state.lock() = ResolverState::Failed(err.clone());
                    return Err(err);
                }
            }
        }
    }

    /// Manual "refresh location": re-enters the precise tier even when
    /// already resolved.
    pub async fn refresh(&self) -> Result<Coordinates, LocationError> {
        self.resolve().await
    }

    fn enter(&self, tier: Tier) {
        *self.state.lock() = match tier {
            Tier::Precise => ResolverState::RequestingPrecise,
            Tier::Degraded => ResolverState::RequestingDegraded,
            Tier::IpFallback => ResolverState::RequestingIp,
        };
    }

    async fn try_precise(&self) -> TierOutcome {
        let Some(provider) = &self.provider else {
            return TierOutcome::Retry(Tier::IpFallback);
        };
        match provider.locate(LocateOptions::precise()).await {
            Ok(coords) => TierOutcome::Success(coords),
            // Accuracy-related: worth retrying with relaxed settings.
            Err(GeoFailure::PositionUnavailable) => TierOutcome::Retry(Tier::Degraded),
            Err(GeoFailure::PermissionDenied) => TierOutcome::Fail(LocationError::PermissionDenied),
            Err(GeoFailure::Timeout) => TierOutcome::Fail(LocationError::Timeout),
        }
    }

    async fn try_degraded(&self) -> TierOutcome {
        let Some(provider) = &self.provider else {
            return TierOutcome::Retry(Tier::IpFallback);
        };
        match provider.locate(LocateOptions::degraded()).await {
            Ok(coords) => TierOutcome::Success(coords),
            Err(failure) => {
                tracing::debug!(?failure, "degraded tier failed");
                TierOutcome::Retry(Tier::IpFallback)
            }
        }
    }

    async fn try_ip(&self) -> TierOutcome {
        match self.ip.locate().await {
            Ok(coords) => TierOutcome::Success(coords),
            Err(err) => TierOutcome::Fail(err),
        }
    }
}
