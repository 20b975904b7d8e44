//! Weather data and positioning for Nimbus
//!
//! Current conditions from an OpenWeatherMap-compatible API, device
//! location through a callback-style platform bridge, and reverse
//! geocoding via Nominatim.

pub mod cache;
pub mod client;
pub mod geocode;
pub mod location;
pub mod service;
pub mod types;

pub use cache::WeatherCache;
pub use client::{parse_weather, WeatherClient, WeatherClientConfig, OPENWEATHER_URL};
pub use geocode::{Address, GeocodeResolver, Geocoder, NominatimGeocoder, NOMINATIM_URL};
pub use location::{
    FixedPositionPlatform, LocationListener, LocationPlatform, LocationRequest, LocationUpdates,
    PositionSource, Priority,
};
pub use service::{DeviceLocationService, LocationService, LocationStream, WeatherService};
pub use types::*;
