//! OpenWeatherMap gateway with cache-first fetches.
//!
//! Every operation derives a cache key, probes [`CacheStore`] and returns
//! without any network traffic on a valid hit. On a miss the raw response
//! body is stored under the same key before being deserialized. Two
//! concurrent misses for one key will each reach the network (cache
//! stampede); the data layer documents rather than eliminates this.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::instrument;

use crate::cache::CacheStore;
use crate::error::WeatherError;
use crate::types::{ApiCurrent, ApiForecast, ApiGeoResult, CityMatch, ForecastSeries, Subject, WeatherSnapshot};

const API_BASE: &str = "https://api.openweathermap.org/data/2.5";
const GEO_BASE: &str = "https://api.openweathermap.org/geo/1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Unconfigured-key sentinel carried over from sample config files.
pub const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

/// Geocoding search is capped at this many results.
const SEARCH_LIMIT: usize = 5;
/// Queries shorter than this short-circuit to an empty result.
const MIN_QUERY_CHARS: usize = 2;
/// The hourly view is the first 24 hours of the 5-day list (3-hour steps).
const HOURLY_SAMPLES: usize = 8;

/// State/request-key for current conditions of a subject.
pub fn current_key(subject: &Subject) -> String {
    format!("current:{}", subject.cache_fragment())
}

/// State/request-key for the 5-day forecast of a named city.
pub fn forecast_key(city: &str) -> String {
    format!("forecast:city:{city}")
}

/// State/request-key for the 24-hour view of a named city.
pub fn hourly_key(city: &str) -> String {
    format!("hourly:city:{city}")
}

fn search_key(query: &str) -> String {
    format!("search:{query}")
}

/// HTTP gateway to the remote weather API.
#[derive(Debug)]
pub struct WeatherClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    geo_url: String,
    cache: Arc<CacheStore>,
}

impl WeatherClient {
    pub fn new(api_key: &str, cache: Arc<CacheStore>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key: api_key.to_string(),
            base_url: API_BASE.to_string(),
            geo_url: GEO_BASE.to_string(),
            cache,
        }
    }

    #[cfg(test)]
    pub fn new_with_base_url(api_key: &str, base_url: &str, cache: Arc<CacheStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
            geo_url: base_url.to_string(),
            cache,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Current conditions for a named city or a coordinate pair.
    #[instrument(skip(self), level = "info")]
    pub async fn current_conditions(
        &self,
        subject: &Subject,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let key = current_key(subject);
        if let Some(raw) = self.cache.get(&key) {
            tracing::debug!(%key, "cache hit");
            return parse_current(raw);
        }

        self.check_key()?;
        tracing::info!(%subject, "fetching current conditions");

        let mut request = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&[("appid", self.api_key.as_str()), ("units", "metric")]);
        request = match subject {
            Subject::City(name) => request.query(&[("q", name.as_str())]),
            Subject::Coordinates(c) => {
                request.query(&[("lat", c.lat.to_string()), ("lon", c.lon.to_string())])
            }
        };

        let raw = self.fetch_json(request).await?;
        self.cache.put(&key, raw.clone());
        parse_current(raw)
    }

    /// 5-day forecast in 3-hour samples for a named city.
    #[instrument(skip(self), level = "info")]
    pub async fn forecast(&self, city: &str) -> Result<ForecastSeries, WeatherError> {
        let key = forecast_key(city);
        if let Some(raw) = self.cache.get(&key) {
            tracing::debug!(%key, "cache hit");
            return parse_forecast(raw);
        }

        self.check_key()?;
        tracing::info!(city, "fetching forecast");

        let raw = self.fetch_forecast_raw(city).await?;
        self.cache.put(&key, raw.clone());
        parse_forecast(raw)
    }

    /// First 24 hours (8 samples) of the 5-day list. There is no separate
    /// hourly endpoint; this reuses the forecast endpoint under its own
    /// cache key.
    #[instrument(skip(self), level = "info")]
    pub async fn hourly_forecast(&self, city: &str) -> Result<ForecastSeries, WeatherError> {
        let key = hourly_key(city);
        if let Some(raw) = self.cache.get(&key) {
            tracing::debug!(%key, "cache hit");
            return parse_forecast(raw).map(truncate_hourly);
        }

        self.check_key()?;
        tracing::info!(city, "fetching hourly forecast");

        let raw = self.fetch_forecast_raw(city).await?;
        self.cache.put(&key, raw.clone());
        parse_forecast(raw).map(truncate_hourly)
    }

    /// Free-text city search, capped at five results. Queries shorter than
    /// two characters return an empty list without touching cache or
    /// network.
    #[instrument(skip(self), level = "info")]
    pub async fn search_cities(&self, query: &str) -> Result<Vec<CityMatch>, WeatherError> {
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }

        let key = search_key(query);
        if let Some(raw) = self.cache.get(&key) {
            tracing::debug!(%key, "cache hit");
            return parse_search(raw);
        }

        self.check_key()?;
        tracing::info!(query, "searching cities");

        let request = self
            .client
            .get(format!("{}/direct", self.geo_url))
            .query(&[
                ("q", query),
                ("limit", &SEARCH_LIMIT.to_string()),
                ("appid", self.api_key.as_str()),
            ]);

        let raw = self.fetch_json(request).await?;
        self.cache.put(&key, raw.clone());
        parse_search(raw)
    }

    async fn fetch_forecast_raw(&self, city: &str) -> Result<Value, WeatherError> {
        let request = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ]);
        self.fetch_json(request).await
    }

    /// Missing or placeholder credentials fail before any network call.
    fn check_key(&self) -> Result<(), WeatherError> {
        if self.api_key.is_empty() || self.api_key == PLACEHOLDER_API_KEY {
            return Err(WeatherError::Configuration(
                "set an OpenWeatherMap API key".to_string(),
            ));
        }
        Ok(())
    }

    async fn fetch_json(&self, request: reqwest::RequestBuilder) -> Result<Value, WeatherError> {
        let response = request.send().await?;
        Self::handle_response(response).await
    }

    /// Classify HTTP outcomes into typed failures.
    async fn handle_response(response: reqwest::Response) -> Result<Value, WeatherError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| WeatherError::Parse(format!("invalid JSON body: {e}")))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(WeatherError::Auth)
        } else if status == StatusCode::NOT_FOUND {
            let message = api_message(response)
                .await
                .unwrap_or_else(|| "location not found".to_string());
            Err(WeatherError::NotFound(message))
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            Err(WeatherError::RateLimited)
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(WeatherError::Api(format!("{status}: {text}")))
        }
    }
}

/// `message` field of an OpenWeatherMap error body, if present.
async fn api_message(response: reqwest::Response) -> Option<String> {
    let body: Value = response.json().await.ok()?;
    body.get("message")?.as_str().map(str::to_string)
}

fn parse_current(raw: Value) -> Result<WeatherSnapshot, WeatherError> {
    let api: ApiCurrent = serde_json::from_value(raw)
        .map_err(|e| WeatherError::Parse(format!("current conditions: {e}")))?;
    Ok(WeatherSnapshot::from_api(api))
}

fn parse_forecast(raw: Value) -> Result<ForecastSeries, WeatherError> {
    let api: ApiForecast =
        serde_json::from_value(raw).map_err(|e| WeatherError::Parse(format!("forecast: {e}")))?;
    Ok(ForecastSeries::from_api(api))
}

fn truncate_hourly(mut series: ForecastSeries) -> ForecastSeries {
    series.samples.truncate(HOURLY_SAMPLES);
    series
}

fn parse_search(raw: Value) -> Result<Vec<CityMatch>, WeatherError> {
    let api: Vec<ApiGeoResult> =
        serde_json::from_value(raw).map_err(|e| WeatherError::Parse(format!("city search: {e}")))?;
    Ok(api.into_iter().take(SEARCH_LIMIT).map(CityMatch::from).collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::types::Coordinates;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn current_body(city: &str, temp: f64) -> Value {
        json!({
            "coord": {"lon": -0.1278, "lat": 51.5074},
            "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
            "main": {"temp": temp, "feels_like": temp - 1.0, "pressure": 1012, "humidity": 60},
            "wind": {"speed": 3.0, "deg": 180},
            "dt": 1_700_000_000,
            "sys": {"country": "GB"},
            "name": city
        })
    }

    fn forecast_body(city: &str, samples: usize) -> Value {
        let list: Vec<Value> = (0..samples)
            .map(|i| {
                json!({
                    "dt": 1_700_000_000 + (i as i64) * 10_800,
                    "main": {"temp": 10.0 + i as f64, "feels_like": 9.0, "pressure": 1010, "humidity": 70},
                    "weather": [{"id": 500, "description": "light rain", "icon": "10d"}],
                    "wind": {"speed": 5.0, "deg": 200}
                })
            })
            .collect();
        json!({"list": list, "city": {"name": city, "country": "FR"}})
    }

    fn client_for(server: &MockServer) -> WeatherClient {
        WeatherClient::new_with_base_url("test_key", &server.uri(), Arc::new(CacheStore::new()))
    }

    #[tokio::test]
    async fn test_current_by_city() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "London"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("London", 12.0)))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let snapshot = client
            .current_conditions(&Subject::city("London"))
            .await
            .unwrap();

        assert_eq!(snapshot.city, "London");
        assert_eq!(snapshot.temperature, 12.0);
    }

    #[tokio::test]
    async fn test_second_fetch_within_ttl_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("Paris", 8.0)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let subject = Subject::city("Paris");
        let first = client.current_conditions(&subject).await.unwrap();
        let second = client.current_conditions(&subject).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_second_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("Paris", 8.0)))
            .expect(2)
            .mount(&server)
            .await;

        let cache = Arc::new(CacheStore::with_ttl(Duration::from_millis(50)));
        let client = WeatherClient::new_with_base_url("test_key", &server.uri(), cache);
        let subject = Subject::city("Paris");

        client.current_conditions(&subject).await.unwrap();
        client.current_conditions(&subject).await.unwrap(); // hit
        tokio::time::sleep(Duration::from_millis(80)).await;
        client.current_conditions(&subject).await.unwrap(); // miss again
    }

    #[tokio::test]
    async fn test_city_and_coordinate_requests_use_distinct_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("London", 12.0)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("lat", "51.5"))
            .and(query_param("lon", "-0.12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("London", 13.0)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let by_name = client
            .current_conditions(&Subject::city("London"))
            .await
            .unwrap();
        let by_coord = client
            .current_conditions(&Subject::from(Coordinates { lat: 51.5, lon: -0.12 }))
            .await
            .unwrap();

        // Same place, distinct cache entries and payloads.
        assert_eq!(by_name.temperature, 12.0);
        assert_eq!(by_coord.temperature, 13.0);
    }

    #[tokio::test]
    async fn test_401_surfaces_as_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .current_conditions(&Subject::city("London"))
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::Auth));
        assert!(err.user_message().contains("minutes"));
    }

    #[tokio::test]
    async fn test_404_surfaces_as_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Nowhereville"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"cod": "404", "message": "city not found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .current_conditions(&Subject::city("Nowhereville"))
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::NotFound(ref msg) if msg == "city not found"));
    }

    #[tokio::test]
    async fn test_429_surfaces_as_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .current_conditions(&Subject::city("London"))
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::RateLimited));
    }

    #[tokio::test]
    async fn test_other_http_failures_surface_as_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .current_conditions(&Subject::city("London"))
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::Api(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_placeholder_key_fails_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client =
            WeatherClient::new_with_base_url(PLACEHOLDER_API_KEY, &server.uri(), Arc::new(CacheStore::new()));
        let err = client
            .current_conditions(&Subject::city("London"))
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_forecast_parses_ordered_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("q", "Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body("Paris", 40)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let series = client.forecast("Paris").await.unwrap();

        assert_eq!(series.city, "Paris");
        assert_eq!(series.samples.len(), 40);
        assert!(series
            .samples
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn test_hourly_is_first_eight_samples_of_forecast_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body("Paris", 40)))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let hourly = client.hourly_forecast("Paris").await.unwrap();

        assert_eq!(hourly.samples.len(), 8);
        assert_eq!(hourly.samples[0].temperature, 10.0);
        assert_eq!(hourly.samples[7].temperature, 17.0);
    }

    #[tokio::test]
    async fn test_forecast_and_hourly_use_distinct_cache_keys() {
        let server = MockServer::start().await;
        // Same endpoint, but keyed separately: two network calls expected.
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body("Paris", 40)))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.forecast("Paris").await.unwrap();
        client.hourly_forecast("Paris").await.unwrap();
    }

    #[tokio::test]
    async fn test_short_query_short_circuits_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.search_cities("").await.unwrap().is_empty());
        assert!(client.search_cities("L").await.unwrap().is_empty());
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_search_maps_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/direct"))
            .and(query_param("q", "Lond"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "London", "country": "GB", "lat": 51.5074, "lon": -0.1278},
                {"name": "London", "country": "CA", "state": "Ontario", "lat": 42.9849, "lon": -81.2453}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let matches = client.search_cities("Lond").await.unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].display_name(), "London, GB");
        assert_eq!(matches[1].display_name(), "London, Ontario, CA");

        // Repeat within the TTL serves from cache (expect(1) above).
        let again = client.search_cities("Lond").await.unwrap();
        assert_eq!(again, matches);
    }
}
