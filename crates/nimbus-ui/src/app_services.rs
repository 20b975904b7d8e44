//! Centralized application services.
//!
//! `AppServices` owns the tokio runtime and the shared clients, and builds
//! screen models wired to them. Clients sit behind `RwLock<Option<..>>` so
//! they can be replaced (e.g. after a config change) or cleared on shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use nimbus_core::Config;
use nimbus_weather::{
    Coordinate, DeviceLocationService, FixedPositionPlatform, GeocodeResolver, LocationRequest,
    LocationService, NominatimGeocoder, PositionSource, WeatherCache, WeatherClient,
    WeatherClientConfig,
};

use crate::models::weather_model::WeatherModel;
use crate::services::weather_service::WeatherBackend;

pub struct AppServices {
    /// Tokio runtime for async operations
    runtime: tokio::runtime::Runtime,

    /// Parent of every model's cancellation token
    shutdown: CancellationToken,

    weather_client: RwLock<Option<Arc<WeatherClient>>>,

    location_service: RwLock<Option<Arc<DeviceLocationService>>>,

    refresh_interval: Duration,
}

impl AppServices {
    /// Build the runtime and clients from `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("nimbus-tokio")
            .build()
            .context("Failed to create tokio runtime")?;

        let services = Self {
            runtime,
            shutdown: CancellationToken::new(),
            weather_client: RwLock::new(None),
            location_service: RwLock::new(None),
            refresh_interval: config.weather.refresh_interval(),
        };
        services.init_weather_client(config)?;
        services.init_location_service(config)?;

        Ok(services)
    }

    /// Get the tokio runtime handle.
    pub fn runtime(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }

    /// Cancel every model created here and clear all clients.
    pub fn shutdown(&self) {
        tracing::info!("AppServices shutdown initiated");

        self.shutdown.cancel();

        if let Some(client) = self.weather_client.write().take() {
            if let Err(e) = client.save_diagnostics() {
                tracing::warn!("Failed to save weather cache: {}", e);
            }
        }
        *self.location_service.write() = None;

        tracing::info!("AppServices shutdown complete");
    }

    // =========== Weather Client ===========

    pub fn weather_client(&self) -> Option<Arc<WeatherClient>> {
        self.weather_client.read().clone()
    }

    pub fn set_weather_client(&self, client: Option<Arc<WeatherClient>>) {
        *self.weather_client.write() = client;
    }

    /// (Re)create the weather client from configuration.
    pub fn init_weather_client(&self, config: &Config) -> Result<()> {
        let client_config = WeatherClientConfig {
            base_url: config.weather.base_url.clone(),
            api_key: config.weather.api_key.clone(),
            units: config.weather.units.as_str().to_string(),
            timeout: config.weather.request_timeout(),
        };

        let mut cache = WeatherCache::new(&config.config_dir);
        if let Err(e) = cache.load() {
            tracing::warn!("Ignoring unreadable weather cache: {}", e);
        }

        let client = WeatherClient::new(client_config)
            .context("Failed to create weather client")?
            .with_cache(cache);

        self.set_weather_client(Some(Arc::new(client)));
        tracing::info!(
            "Weather client initialized with base_url: {}",
            config.weather.base_url
        );
        Ok(())
    }

    // =========== Location Service ===========

    pub fn location_service(&self) -> Option<Arc<DeviceLocationService>> {
        self.location_service.read().clone()
    }

    /// (Re)create the positioning and geocoding stack from configuration.
    pub fn init_location_service(&self, config: &Config) -> Result<()> {
        let fixed = config
            .location
            .fixed_position()
            .map(|(lat, lon)| Coordinate::new(lat, lon));
        if fixed.is_none() {
            tracing::warn!("No fixed position configured; current location will be unavailable");
        }

        let request = LocationRequest {
            interval: Duration::from_millis(config.location.interval_ms),
            min_update_interval: Duration::from_millis(config.location.min_update_interval_ms),
            min_distance_meters: config.location.min_distance_meters,
            ..LocationRequest::default()
        };
        let source = PositionSource::with_request(Arc::new(FixedPositionPlatform::new(fixed)), request)
            .with_fix_timeout(Duration::from_secs(config.location.fix_timeout_secs));

        let geocoder = NominatimGeocoder::new(
            &config.geocode.base_url,
            config.geocode.user_agent.as_deref(),
        )
        .context("Failed to create geocoder")?;

        let service = DeviceLocationService::new(
            Arc::new(source),
            GeocodeResolver::new(Arc::new(geocoder)),
        );
        *self.location_service.write() = Some(Arc::new(service));
        Ok(())
    }

    // =========== Screen Models ===========

    /// A weather screen model bound to the current clients.
    pub fn weather_model(&self) -> Result<WeatherModel> {
        let location: Arc<dyn LocationService> = self
            .location_service()
            .context("Location service not initialized")?;
        let weather = self
            .weather_client()
            .context("Weather client not initialized")?;

        Ok(WeatherModel::new(
            WeatherBackend::new(location, weather),
            self.runtime(),
            self.refresh_interval,
            self.shutdown.child_token(),
        ))
    }
}
