//! OpenWeatherMap-compatible current conditions client.

use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::cache::WeatherCache;
use crate::types::{Coordinate, WeatherError, WeatherSnapshot};

pub const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone)]
pub struct WeatherClientConfig {
    pub base_url: String,
    pub api_key: String,
    /// `metric`, `imperial` or `standard`
    pub units: String,
    pub timeout: Duration,
}

impl Default for WeatherClientConfig {
    fn default() -> Self {
        Self {
            base_url: OPENWEATHER_URL.to_string(),
            api_key: String::new(),
            units: "metric".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct WeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    units: String,
    cache: Mutex<WeatherCache>,
}

impl WeatherClient {
    pub fn new(config: WeatherClientConfig) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            units: config.units,
            cache: Mutex::new(WeatherCache::in_memory()),
        })
    }

    /// Replace the in-memory cache, e.g. with one backed by the config dir.
    pub fn with_cache(mut self, cache: WeatherCache) -> Self {
        self.cache = Mutex::new(cache);
        self
    }

    /// Current conditions at `coordinate`.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_by_coordinate(
        &self,
        coordinate: Coordinate,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let raw = self
            .get_json(
                "weather",
                &[
                    ("lat", coordinate.latitude.to_string()),
                    ("lon", coordinate.longitude.to_string()),
                ],
            )
            .await?;
        self.remember(parse_weather(raw)?)
    }

    /// Current conditions for a city name, passed to the provider as-is.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_by_city(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        let raw = self.get_json("weather", &[("q", city.to_string())]).await?;
        self.remember(parse_weather(raw)?)
    }

    /// Raw forecast payload for `coordinate`. Not interpreted.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_forecast(&self, coordinate: Coordinate) -> Result<Value, WeatherError> {
        self.get_json(
            "forecast",
            &[
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
            ],
        )
        .await
    }

    /// Most recent successfully parsed snapshot. Diagnostics only.
    pub fn last_snapshot(&self) -> Option<WeatherSnapshot> {
        self.cache.lock().get().cloned()
    }

    /// Persist the last snapshot if the cache has a backing file.
    pub fn save_diagnostics(&self) -> Result<(), WeatherError> {
        self.cache.lock().save()
    }

    fn remember(&self, snapshot: WeatherSnapshot) -> Result<WeatherSnapshot, WeatherError> {
        self.cache.lock().update(snapshot.clone());
        Ok(snapshot)
    }

    async fn get_json(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value, WeatherError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("appid", self.api_key.as_str()), ("units", self.units.as_str())])
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Value, WeatherError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| WeatherError::Unexpected(format!("JSON parse error: {}", e)));
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or(text)
            });

        tracing::warn!("Weather API returned {}: {}", status, message);
        Err(WeatherError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiCurrent {
    #[serde(default)]
    name: String,
    coord: Option<ApiCoord>,
    weather: Vec<ApiCondition>,
    main: ApiMain,
    wind: ApiWind,
    #[serde(default)]
    clouds: ApiClouds,
    rain: Option<ApiPrecipitation>,
    snow: Option<ApiPrecipitation>,
    dt: i64,
    sys: ApiSys,
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct ApiCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct ApiCondition {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct ApiMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: u32,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct ApiWind {
    speed: f64,
    #[serde(default)]
    deg: u16,
}

#[derive(Debug, Default, Deserialize)]
struct ApiClouds {
    #[serde(default)]
    all: u8,
}

#[derive(Debug, Deserialize)]
struct ApiPrecipitation {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiSys {
    #[serde(default)]
    country: String,
    sunrise: i64,
    sunset: i64,
}

/// Normalize a current-conditions payload into a snapshot.
///
/// The first `weather` entry supplies description and icon; an empty list
/// is an error. Wind direction defaults to 0. Rain and snow come from their
/// `1h` fields.
pub fn parse_weather(raw: Value) -> Result<WeatherSnapshot, WeatherError> {
    let api: ApiCurrent = serde_json::from_value(raw.clone())
        .map_err(|e| WeatherError::Unexpected(format!("Malformed weather payload: {}", e)))?;

    let condition = api
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::Unexpected("Weather payload has no conditions".into()))?;

    Ok(WeatherSnapshot {
        place_name: api.name,
        country: api.sys.country,
        coordinate: api.coord.map(|c| Coordinate::new(c.lat, c.lon)),
        temperature: api.main.temp,
        feels_like: api.main.feels_like,
        temp_min: api.main.temp_min,
        temp_max: api.main.temp_max,
        humidity: api.main.humidity,
        pressure: api.main.pressure,
        wind_speed: api.wind.speed,
        wind_direction: api.wind.deg,
        description: condition.description,
        icon: condition.icon,
        cloudiness: api.clouds.all,
        sunrise: api.sys.sunrise,
        sunset: api.sys.sunset,
        timezone_offset: api.timezone,
        observed_at: api.dt,
        rain_1h: api.rain.and_then(|r| r.one_hour),
        snow_1h: api.snow.and_then(|s| s.one_hour),
        is_favorite: false,
        raw,
    })
}
