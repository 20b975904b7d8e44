use crate::services::weather_service::ScreenError;
use nimbus_core::{AppError, NetworkError};
use nimbus_weather::WeatherError as ProviderError;

impl From<ScreenError> for AppError {
    fn from(e: ScreenError) -> Self {
        match e {
            ScreenError::NoLocation => AppError::LocationUnavailable,
            ScreenError::EmptyCity => AppError::Validation(ScreenError::EmptyCity.to_string()),
            ScreenError::Tracking(source) => {
                tracing::debug!("Location stream failed: {}", source);
                AppError::Stream(ScreenError::Tracking(source).to_string())
            }
            ScreenError::Provider(ProviderError::Network(s)) => {
                AppError::Network(NetworkError::ConnectionFailed(s))
            }
            ScreenError::Provider(ProviderError::Timeout) => AppError::Network(NetworkError::Timeout),
            ScreenError::Provider(ProviderError::Api { status, message }) => {
                AppError::Api { status, message }
            }
            ScreenError::Provider(ProviderError::Unexpected(s))
            | ScreenError::Provider(ProviderError::Cache(s)) => AppError::Unknown(s),
        }
    }
}
