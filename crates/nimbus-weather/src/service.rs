//! Capability traits the screen layer depends on, and their production
//! implementations.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::client::WeatherClient;
use crate::geocode::GeocodeResolver;
use crate::location::PositionSource;
use crate::types::{Coordinate, LocationError, WeatherError, WeatherSnapshot};

/// Live location updates as a boxed stream
pub type LocationStream = Pin<Box<dyn Stream<Item = Result<Coordinate, LocationError>> + Send>>;

#[async_trait]
pub trait LocationService: Send + Sync {
    /// One position fix, `None` when unobtainable.
    async fn current_location(&self) -> Option<Coordinate>;

    /// Human-readable place name for `coordinate`, best effort.
    async fn city_name(&self, coordinate: Coordinate) -> Option<String>;

    /// Start live tracking. Dropping the stream stops it.
    fn location_updates(&self) -> LocationStream;
}

#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn weather_for(&self, coordinate: Coordinate) -> Result<WeatherSnapshot, WeatherError>;

    async fn weather_by_city(&self, city: &str) -> Result<WeatherSnapshot, WeatherError>;
}

/// [`LocationService`] over the device positioning platform
pub struct DeviceLocationService {
    source: Arc<PositionSource>,
    geocoder: GeocodeResolver,
}

impl DeviceLocationService {
    pub fn new(source: Arc<PositionSource>, geocoder: GeocodeResolver) -> Self {
        Self { source, geocoder }
    }

    pub fn source(&self) -> &Arc<PositionSource> {
        &self.source
    }
}

#[async_trait]
impl LocationService for DeviceLocationService {
    async fn current_location(&self) -> Option<Coordinate> {
        self.source.get_once().await
    }

    async fn city_name(&self, coordinate: Coordinate) -> Option<String> {
        self.geocoder.resolve(coordinate).await
    }

    fn location_updates(&self) -> LocationStream {
        Box::pin(self.source.stream())
    }
}

#[async_trait]
impl WeatherService for WeatherClient {
    async fn weather_for(&self, coordinate: Coordinate) -> Result<WeatherSnapshot, WeatherError> {
        self.fetch_by_coordinate(coordinate).await
    }

    async fn weather_by_city(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        self.fetch_by_city(city).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{Address, Geocoder};
    use crate::location::FixedPositionPlatform;
    use crate::types::GeocodeError;
    use tokio_stream::StreamExt;

    struct OneCity;

    #[async_trait]
    impl Geocoder for OneCity {
        async fn reverse(&self, _: Coordinate, _: usize) -> Result<Vec<Address>, GeocodeError> {
            Ok(vec![Address {
                locality: Some("Reykjavík".to_string()),
                ..Address::default()
            }])
        }
    }

    fn service(fix: Option<Coordinate>) -> (DeviceLocationService, Arc<FixedPositionPlatform>) {
        let platform = Arc::new(FixedPositionPlatform::new(fix));
        let source = Arc::new(PositionSource::new(platform.clone()));
        let geocoder = GeocodeResolver::new(Arc::new(OneCity));
        (DeviceLocationService::new(source, geocoder), platform)
    }

    #[tokio::test]
    async fn test_device_service_delegates() {
        let fix = Coordinate::new(64.1466, -21.9426);
        let (service, _) = service(Some(fix));

        assert_eq!(service.current_location().await, Some(fix));
        assert_eq!(service.city_name(fix).await.as_deref(), Some("Reykjavík"));
    }

    #[tokio::test]
    async fn test_location_updates_release_on_drop() {
        let fix = Coordinate::new(64.1466, -21.9426);
        let (service, platform) = service(Some(fix));

        let mut updates = service.location_updates();
        assert_eq!(updates.next().await, Some(Ok(fix)));
        assert!(service.source().is_tracking());
        assert_eq!(platform.active_listeners(), 1);

        drop(updates);
        assert!(!service.source().is_tracking());
        assert_eq!(platform.active_listeners(), 0);
    }

    #[tokio::test]
    async fn test_no_position_configured() {
        let (service, _) = service(None);
        assert_eq!(service.current_location().await, None);

        let mut updates = service.location_updates();
        assert_eq!(
            updates.next().await,
            Some(Err(LocationError::PermissionDenied))
        );
        assert_eq!(updates.next().await, None);
    }
}
