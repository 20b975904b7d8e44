//! Maps screen-layer errors to nimbus_core::AppError for consistent user-facing messages.

mod weather;

#[cfg(test)]
mod tests {
    use nimbus_core::{AppError, NetworkError};
    use nimbus_weather::{LocationError, WeatherError as ProviderError};

    use crate::services::weather_service::ScreenError;

    fn screen_message(e: ScreenError) -> String {
        AppError::from(e).screen_message()
    }

    #[test]
    fn fixed_messages() {
        assert_eq!(
            screen_message(ScreenError::NoLocation),
            "Unable to get current location"
        );
        assert_eq!(
            screen_message(ScreenError::EmptyCity),
            "City name cannot be empty"
        );
        assert_eq!(
            screen_message(ScreenError::Tracking(LocationError::PermissionDenied)),
            "Location tracking failed"
        );
    }

    #[test]
    fn network_failure_mentions_network() {
        let e = ScreenError::Provider(ProviderError::Network("connection refused".into()));
        let app = AppError::from(e);
        assert!(matches!(app, AppError::Network(_)));
        assert!(app.screen_message().starts_with("Network error"));
        assert!(app.screen_message().contains("connection refused"));
    }

    #[test]
    fn timeout_stays_typed() {
        let app = AppError::from(ScreenError::Provider(ProviderError::Timeout));
        assert!(matches!(app, AppError::Network(NetworkError::Timeout)));
        assert_eq!(app.screen_message(), "Network error: Request timed out");
    }

    #[test]
    fn api_failure_keeps_status() {
        let e = ScreenError::Provider(ProviderError::Api {
            status: 404,
            message: "city not found".into(),
        });
        assert_eq!(screen_message(e), "API error 404: city not found");
    }

    #[test]
    fn empty_unexpected_falls_back() {
        let e = ScreenError::Provider(ProviderError::Unexpected(String::new()));
        assert_eq!(screen_message(e), "Unknown error");
    }
}
