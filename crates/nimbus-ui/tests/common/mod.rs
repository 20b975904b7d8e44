//! Test doubles for the weather screen: a hand-driven location platform,
//! a canned geocoder and a scripted weather service.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use nimbus_ui::{WeatherBackend, WeatherModel};
use nimbus_weather::location::{LastKnownCallback, ListenerId};
use nimbus_weather::{
    Address, Coordinate, DeviceLocationService, GeocodeError, GeocodeResolver, Geocoder,
    LocationError, LocationListener, LocationPlatform, LocationRequest, PositionSource,
    WeatherError, WeatherService, WeatherSnapshot,
};

pub const OSLO: Coordinate = Coordinate {
    latitude: 59.9139,
    longitude: 10.7522,
};

pub const BERGEN: Coordinate = Coordinate {
    latitude: 60.3913,
    longitude: 5.3221,
};

pub const REFRESH: Duration = Duration::from_secs(10);

pub fn snapshot(place: &str, coordinate: Coordinate, temperature: f64) -> WeatherSnapshot {
    WeatherSnapshot {
        place_name: place.to_string(),
        country: "NO".to_string(),
        coordinate: Some(coordinate),
        temperature,
        feels_like: temperature - 2.0,
        temp_min: temperature - 1.0,
        temp_max: temperature + 1.0,
        humidity: 80,
        pressure: 1012,
        wind_speed: 4.0,
        wind_direction: 180,
        description: "overcast clouds".to_string(),
        icon: "04d".to_string(),
        cloudiness: 100,
        sunrise: 1_700_030_000,
        sunset: 1_700_055_000,
        timezone_offset: 3600,
        observed_at: 1_700_040_000,
        rain_1h: None,
        snow_1h: None,
        is_favorite: false,
        raw: serde_json::Value::Null,
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Location platform driven by the test.
#[derive(Default)]
pub struct ManualPlatform {
    last_known: Mutex<Option<Coordinate>>,
    deny_last_known: AtomicBool,
    deny_updates: AtomicBool,
    next_id: AtomicU64,
    listeners: Mutex<HashMap<ListenerId, Arc<dyn LocationListener>>>,
    registrations: AtomicUsize,
    removals: AtomicUsize,
}

impl ManualPlatform {
    pub fn with_last_known(fix: Coordinate) -> Self {
        let platform = Self::default();
        *platform.last_known.lock() = Some(fix);
        platform
    }

    pub fn denied() -> Self {
        let platform = Self::default();
        platform.deny_last_known.store(true, Ordering::SeqCst);
        platform.deny_updates.store(true, Ordering::SeqCst);
        platform
    }

    pub fn deny_updates(&self) {
        self.deny_updates.store(true, Ordering::SeqCst);
    }

    /// Deliver `fix` to every registered listener.
    pub fn push(&self, fix: Coordinate) {
        let listeners: Vec<_> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener.on_location(fix);
        }
    }

    pub fn active(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Every removal call, including ones for unknown ids
    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

impl LocationPlatform for ManualPlatform {
    fn last_known_location(&self, callback: LastKnownCallback) {
        if self.deny_last_known.load(Ordering::SeqCst) {
            callback(Err(LocationError::PermissionDenied));
        } else {
            callback(Ok(*self.last_known.lock()));
        }
    }

    fn request_location_updates(
        &self,
        _request: &LocationRequest,
        listener: Arc<dyn LocationListener>,
    ) -> Result<ListenerId, LocationError> {
        if self.deny_updates.load(Ordering::SeqCst) {
            return Err(LocationError::PermissionDenied);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(id, listener);
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn remove_location_updates(&self, id: ListenerId) {
        self.removals.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().remove(&id);
    }
}

pub struct StaticGeocoder(pub Option<&'static str>);

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn reverse(&self, _: Coordinate, _: usize) -> Result<Vec<Address>, GeocodeError> {
        Ok(self
            .0
            .map(|name| Address {
                locality: Some(name.to_string()),
                ..Address::default()
            })
            .into_iter()
            .collect())
    }
}

struct Scripted {
    result: Result<WeatherSnapshot, WeatherError>,
    delay: Duration,
}

/// Weather service answering from a script, counting calls.
pub struct FakeWeather {
    by_coordinate: Mutex<Scripted>,
    by_city: Mutex<Scripted>,
    coordinate_calls: AtomicUsize,
    city_calls: AtomicUsize,
    last_coordinate: Mutex<Option<Coordinate>>,
    last_city: Mutex<Option<String>>,
}

impl FakeWeather {
    pub fn new(coordinate_result: Result<WeatherSnapshot, WeatherError>) -> Self {
        Self {
            by_coordinate: Mutex::new(Scripted {
                result: coordinate_result,
                delay: Duration::ZERO,
            }),
            by_city: Mutex::new(Scripted {
                result: Ok(snapshot("Bergen", BERGEN, 9.0)),
                delay: Duration::ZERO,
            }),
            coordinate_calls: AtomicUsize::new(0),
            city_calls: AtomicUsize::new(0),
            last_coordinate: Mutex::new(None),
            last_city: Mutex::new(None),
        }
    }

    pub fn set_coordinate_result(&self, result: Result<WeatherSnapshot, WeatherError>) {
        self.by_coordinate.lock().result = result;
    }

    pub fn set_coordinate_delay(&self, delay: Duration) {
        self.by_coordinate.lock().delay = delay;
    }

    pub fn set_city_result(&self, result: Result<WeatherSnapshot, WeatherError>) {
        self.by_city.lock().result = result;
    }

    pub fn set_city_delay(&self, delay: Duration) {
        self.by_city.lock().delay = delay;
    }

    pub fn coordinate_calls(&self) -> usize {
        self.coordinate_calls.load(Ordering::SeqCst)
    }

    pub fn city_calls(&self) -> usize {
        self.city_calls.load(Ordering::SeqCst)
    }

    pub fn last_coordinate(&self) -> Option<Coordinate> {
        *self.last_coordinate.lock()
    }

    pub fn last_city(&self) -> Option<String> {
        self.last_city.lock().clone()
    }
}

#[async_trait]
impl WeatherService for FakeWeather {
    async fn weather_for(&self, coordinate: Coordinate) -> Result<WeatherSnapshot, WeatherError> {
        self.coordinate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_coordinate.lock() = Some(coordinate);

        let (result, delay) = {
            let scripted = self.by_coordinate.lock();
            (scripted.result.clone(), scripted.delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result.map(|mut s| {
            s.coordinate = Some(coordinate);
            s
        })
    }

    async fn weather_by_city(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        self.city_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_city.lock() = Some(city.to_string());

        let (result, delay) = {
            let scripted = self.by_city.lock();
            (scripted.result.clone(), scripted.delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

/// A model over the real position source and the given doubles.
pub struct Harness {
    pub model: WeatherModel,
    pub platform: Arc<ManualPlatform>,
    pub weather: Arc<FakeWeather>,
}

impl Harness {
    pub fn new(platform: ManualPlatform, weather: FakeWeather) -> Self {
        Self::with_geocoder(platform, weather, StaticGeocoder(None))
    }

    pub fn with_geocoder(
        platform: ManualPlatform,
        weather: FakeWeather,
        geocoder: StaticGeocoder,
    ) -> Self {
        let platform = Arc::new(platform);
        let weather = Arc::new(weather);

        let source = PositionSource::new(platform.clone());
        let location = DeviceLocationService::new(
            Arc::new(source),
            GeocodeResolver::new(Arc::new(geocoder)),
        );
        let backend = WeatherBackend::new(Arc::new(location), weather.clone());

        let model = WeatherModel::new(
            backend,
            tokio::runtime::Handle::current(),
            REFRESH,
            CancellationToken::new(),
        );

        Self {
            model,
            platform,
            weather,
        }
    }
}
