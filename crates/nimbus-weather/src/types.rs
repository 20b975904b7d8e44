use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Geographic position reported by a positioning provider (a "fix").
///
/// Equality is exact on both fields; consecutive stream emissions are
/// deduplicated with it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components fall inside WGS84 ranges
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// One fetched-and-parsed weather observation for a place.
///
/// Built by [`crate::WeatherClient`] from a provider response. `is_favorite`
/// is the only field that changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub place_name: String,
    /// ISO 3166 country code, empty when the provider has none (open sea)
    pub country: String,
    /// Position of the place as reported by the provider
    pub coordinate: Option<Coordinate>,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Relative humidity in percent
    pub humidity: u8,
    /// Sea level pressure in hPa
    pub pressure: u32,
    pub wind_speed: f64,
    /// Meteorological degrees, 0 when the provider omits it
    pub wind_direction: u16,
    pub description: String,
    pub icon: String,
    /// Cloud cover in percent
    pub cloudiness: u8,
    /// Epoch seconds
    pub sunrise: i64,
    /// Epoch seconds
    pub sunset: i64,
    /// Shift in seconds from UTC
    pub timezone_offset: i32,
    /// Epoch seconds of the observation
    pub observed_at: i64,
    /// Rain volume for the last hour, mm
    pub rain_1h: Option<f64>,
    /// Snow volume for the last hour, mm
    pub snow_1h: Option<f64>,
    pub is_favorite: bool,
    /// Untouched provider payload, kept for diagnostics
    pub raw: serde_json::Value,
}

impl WeatherSnapshot {
    /// Same snapshot with the favorite flag replaced
    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    pub fn observed_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.observed_at, 0)
    }

    /// The place's UTC offset, if the provider sent a sane value
    pub fn local_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.timezone_offset)
    }

    pub fn sunrise_local(&self) -> Option<DateTime<FixedOffset>> {
        self.to_local(self.sunrise)
    }

    pub fn sunset_local(&self) -> Option<DateTime<FixedOffset>> {
        self.to_local(self.sunset)
    }

    fn to_local(&self, epoch: i64) -> Option<DateTime<FixedOffset>> {
        let offset = self.local_offset()?;
        Some(DateTime::from_timestamp(epoch, 0)?.with_timezone(&offset))
    }
}

/// Location service errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location tracking already started")]
    AlreadyTracking,
    #[error("Location error: {0}")]
    Other(String),
}

/// Weather provider errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected error: {0}")]
    Unexpected(String),
    #[error("Cache error: {0}")]
    Cache(String),
}

impl WeatherError {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        match e.status() {
            Some(status) => Self::Api {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None if e.is_decode() => Self::Unexpected(e.to_string()),
            None => Self::Network(e.to_string()),
        }
    }
}

/// Reverse geocoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeocodeError {
    #[error("Geocoder unavailable: {0}")]
    Unavailable(String),
    #[error("Geocoding lookup failed: {0}")]
    Lookup(String),
}
