//! Weather backend: location, lookup and validation steps the screen model
//! sequences. Every method is async and free of screen state.

use std::sync::Arc;

use nimbus_weather::{
    Coordinate, LocationError, LocationService, LocationStream, WeatherError as ProviderError,
    WeatherService, WeatherSnapshot,
};

/// Error type for weather screen operations
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenError {
    /// No position fix could be obtained
    NoLocation,
    EmptyCity,
    Provider(ProviderError),
    Tracking(LocationError),
}

impl std::fmt::Display for ScreenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreenError::NoLocation => write!(f, "Unable to get current location"),
            ScreenError::EmptyCity => write!(f, "City name cannot be empty"),
            ScreenError::Provider(e) => write!(f, "{}", e),
            ScreenError::Tracking(_) => write!(f, "Location tracking failed"),
        }
    }
}

impl std::error::Error for ScreenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScreenError::Provider(e) => Some(e),
            ScreenError::Tracking(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProviderError> for ScreenError {
    fn from(e: ProviderError) -> Self {
        ScreenError::Provider(e)
    }
}

/// Trimmed city name, or [`ScreenError::EmptyCity`] when blank
pub fn validate_city(name: &str) -> Result<&str, ScreenError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(ScreenError::EmptyCity)
    } else {
        Ok(trimmed)
    }
}

/// Location and weather collaborators behind one handle.
#[derive(Clone)]
pub struct WeatherBackend {
    location: Arc<dyn LocationService>,
    weather: Arc<dyn WeatherService>,
}

impl WeatherBackend {
    pub fn new(location: Arc<dyn LocationService>, weather: Arc<dyn WeatherService>) -> Self {
        Self { location, weather }
    }

    pub async fn locate(&self) -> Result<Coordinate, ScreenError> {
        self.location
            .current_location()
            .await
            .ok_or(ScreenError::NoLocation)
    }

    /// Weather at `coordinate`. A blank provider place name is replaced by
    /// the reverse-geocoded one when available.
    pub async fn fetch_for_coordinate(
        &self,
        coordinate: Coordinate,
    ) -> Result<WeatherSnapshot, ScreenError> {
        let mut snapshot = self.weather.weather_for(coordinate).await?;

        if snapshot.place_name.trim().is_empty() {
            if let Some(name) = self.location.city_name(coordinate).await {
                tracing::debug!("Filled missing place name from geocoder: {}", name);
                snapshot.place_name = name;
            }
        }

        Ok(snapshot)
    }

    pub async fn fetch_for_city(&self, name: &str) -> Result<WeatherSnapshot, ScreenError> {
        let city = validate_city(name)?;
        Ok(self.weather.weather_by_city(city).await?)
    }

    pub fn track(&self) -> LocationStream {
        self.location.location_updates()
    }
}
