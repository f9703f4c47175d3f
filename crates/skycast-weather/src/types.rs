use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// The logical entity a fetch, cache, or refresh operation is keyed on:
/// either a named city or a coordinate pair.
///
/// Name-keyed and coordinate-keyed subjects for the "same" place are
/// deliberately distinct; no geocoding equivalence is inferred.
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    City(String),
    Coordinates(Coordinates),
}

impl Subject {
    pub fn city(name: impl Into<String>) -> Self {
        Self::City(name.into())
    }

    /// Key fragment used in cache and request-state keys.
    ///
    /// The `city:`/`coord:` prefixes guarantee the two derivations never
    /// collide.
    pub fn cache_fragment(&self) -> String {
        match self {
            Self::City(name) => format!("city:{name}"),
            Self::Coordinates(c) => format!("coord:{},{}", c.lat, c.lon),
        }
    }
}

impl From<Coordinates> for Subject {
    fn from(coords: Coordinates) -> Self {
        Self::Coordinates(coords)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::City(name) => write!(f, "{name}"),
            Self::Coordinates(c) => write!(f, "{}, {}", c.lat, c.lon),
        }
    }
}

/// Current conditions for one subject. Temperatures are canonical °C;
/// unit conversion happens downstream of the data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub country: Option<String>,
    pub coord: Coordinates,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub pressure: u32,
    pub wind_speed: f64,
    pub wind_deg: Option<u16>,
    pub condition_id: i32,
    pub condition_icon: String,
    pub condition_description: String,
    pub observed_at: DateTime<Utc>,
}

/// One 3-hour forecast sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub pressure: u32,
    pub wind_speed: f64,
    pub wind_deg: Option<u16>,
    pub condition_id: i32,
    pub condition_icon: String,
    pub condition_description: String,
}

/// Ordered 3-hour-interval samples spanning 5 days.
///
/// Immutable once fetched; a refetch replaces the whole series, never
/// patches samples in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub city: String,
    pub country: Option<String>,
    pub samples: Vec<ForecastSample>,
}

/// One geocoding search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityMatch {
    pub name: String,
    pub country: String,
    pub state: Option<String>,
    pub coord: Coordinates,
}

impl CityMatch {
    /// "Portland, Oregon, US" or "London, GB".
    pub fn display_name(&self) -> String {
        match &self.state {
            Some(state) => format!("{}, {}, {}", self.name, state, self.country),
            None => format!("{}, {}", self.name, self.country),
        }
    }
}

/// URL of the provider-hosted icon for a condition icon code.
pub fn icon_url(icon: &str) -> String {
    format!("https://openweathermap.org/img/wn/{icon}@2x.png")
}

// --- Wire types (OpenWeatherMap response shapes, only consumed fields) ---

#[derive(Debug, Deserialize)]
pub struct ApiCoord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct ApiCondition {
    pub id: i32,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiMain {
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: u32,
    pub humidity: u8,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiWind {
    #[serde(default)]
    pub speed: f64,
    pub deg: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiSys {
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCurrent {
    pub coord: ApiCoord,
    pub weather: Vec<ApiCondition>,
    pub main: ApiMain,
    #[serde(default)]
    pub wind: ApiWind,
    pub dt: i64,
    #[serde(default)]
    pub sys: ApiSys,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiForecastEntry {
    pub dt: i64,
    pub main: ApiMain,
    pub weather: Vec<ApiCondition>,
    #[serde(default)]
    pub wind: ApiWind,
}

#[derive(Debug, Deserialize)]
pub struct ApiForecastCity {
    pub name: String,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiForecast {
    pub list: Vec<ApiForecastEntry>,
    pub city: ApiForecastCity,
}

#[derive(Debug, Deserialize)]
pub struct ApiGeoResult {
    pub name: String,
    pub country: String,
    pub state: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl WeatherSnapshot {
    pub fn from_api(api: ApiCurrent) -> Self {
        let (id, icon, description) = condition_fields(&api.weather);
        Self {
            city: api.name,
            country: api.sys.country,
            coord: Coordinates {
                lat: api.coord.lat,
                lon: api.coord.lon,
            },
            temperature: api.main.temp,
            feels_like: api.main.feels_like,
            humidity: api.main.humidity,
            pressure: api.main.pressure,
            wind_speed: api.wind.speed,
            wind_deg: api.wind.deg,
            condition_id: id,
            condition_icon: icon,
            condition_description: description,
            observed_at: DateTime::from_timestamp(api.dt, 0).unwrap_or_default(),
        }
    }
}

impl ForecastSample {
    fn from_api(api: ApiForecastEntry) -> Self {
        let (id, icon, description) = condition_fields(&api.weather);
        Self {
            timestamp: DateTime::from_timestamp(api.dt, 0).unwrap_or_default(),
            temperature: api.main.temp,
            feels_like: api.main.feels_like,
            humidity: api.main.humidity,
            pressure: api.main.pressure,
            wind_speed: api.wind.speed,
            wind_deg: api.wind.deg,
            condition_id: id,
            condition_icon: icon,
            condition_description: description,
        }
    }
}

impl ForecastSeries {
    pub fn from_api(api: ApiForecast) -> Self {
        Self {
            city: api.city.name,
            country: api.city.country,
            samples: api.list.into_iter().map(ForecastSample::from_api).collect(),
        }
    }
}

impl From<ApiGeoResult> for CityMatch {
    fn from(api: ApiGeoResult) -> Self {
        Self {
            name: api.name,
            country: api.country,
            state: api.state,
            coord: Coordinates {
                lat: api.lat,
                lon: api.lon,
            },
        }
    }
}

fn condition_fields(weather: &[ApiCondition]) -> (i32, String, String) {
    match weather.first() {
        Some(c) => (c.id, c.icon.clone(), c.description.clone()),
        None => (0, String::new(), String::new()),
    }
}
