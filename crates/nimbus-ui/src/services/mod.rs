pub mod weather_service;

pub use weather_service::{validate_city, ScreenError, WeatherBackend};
