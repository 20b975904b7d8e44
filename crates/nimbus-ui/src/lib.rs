pub mod app_services;
pub mod error_mapping;
pub mod models;
pub mod screen_state;
pub mod services;

pub use app_services::AppServices;
pub use models::weather_model::WeatherModel;
pub use screen_state::ScreenState;
pub use services::weather_service::{ScreenError, WeatherBackend};
