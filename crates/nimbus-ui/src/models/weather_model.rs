//! Weather screen model: sequences location and weather lookups and
//! publishes one [`ScreenState`].
//!
//! Triggers are fire-and-forget. Work runs on the runtime handle given at
//! construction and is tracked so [`WeatherModel::closed`] can wait for it.
//! Results from different triggers are applied in completion order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use nimbus_core::AppError;
use nimbus_weather::{Coordinate, WeatherSnapshot};

use crate::screen_state::ScreenState;
use crate::services::weather_service::{validate_city, ScreenError, WeatherBackend};

/// Which favorite flag a successful result gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Favorite {
    /// Keep the flag of the snapshot shown when the result lands
    Carry,
    Reset,
}

struct Subscription {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    backend: WeatherBackend,
    state: watch::Sender<ScreenState>,
    last_location: Mutex<Option<Coordinate>>,
    refresh_interval: Duration,
    runtime: Handle,
    cancel: CancellationToken,
    tasks: TaskTracker,
    refresh_loop: Mutex<Option<CancellationToken>>,
    tracking: Mutex<Option<Subscription>>,
}

/// State machine behind the weather screen.
///
/// Shuts down when dropped.
pub struct WeatherModel {
    inner: Arc<Inner>,
}

impl WeatherModel {
    /// `cancel` is the parent token; cancelling it stops this model too.
    pub fn new(
        backend: WeatherBackend,
        runtime: Handle,
        refresh_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ScreenState::Default);

        Self {
            inner: Arc::new(Inner {
                backend,
                state,
                last_location: Mutex::new(None),
                refresh_interval,
                runtime,
                cancel,
                tasks: TaskTracker::new(),
                refresh_loop: Mutex::new(None),
                tracking: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ScreenState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenState> {
        self.inner.state.subscribe()
    }

    pub fn last_location(&self) -> Option<Coordinate> {
        *self.inner.last_location.lock()
    }

    /// Whether a live location subscription is running
    pub fn is_tracking(&self) -> bool {
        self.inner
            .tracking
            .lock()
            .as_ref()
            .is_some_and(|sub| !sub.cancel.is_cancelled() && !sub.handle.is_finished())
    }

    /// Fetch weather for the current position and (re)start auto-refresh.
    pub fn initialize(&self) {
        if self.is_shut_down() {
            return;
        }
        tracing::info!("Weather screen initializing");
        self.fetch_current_location_weather();
        self.start_auto_refresh();
    }

    /// Manual refresh, same as [`Self::fetch_current_location_weather`].
    pub fn refresh(&self) {
        self.fetch_current_location_weather();
    }

    /// Locate the device, then fetch weather there.
    ///
    /// Shows `Loading` unless a snapshot is already on screen, so the
    /// favorite choice survives the refresh.
    pub fn fetch_current_location_weather(&self) {
        if self.is_shut_down() {
            return;
        }

        self.inner.state.send_if_modified(|state| {
            if matches!(state, ScreenState::Success(_)) {
                return false;
            }
            *state = ScreenState::Loading;
            true
        });

        let inner = self.inner.clone();
        self.inner.spawn(async move {
            match inner.backend.locate().await {
                Ok(coordinate) => {
                    tracing::info!("Got location: {}", coordinate);
                    inner.remember(coordinate);
                    inner.fetch_and_apply(coordinate).await;
                }
                Err(e) => {
                    tracing::warn!("Current location unavailable");
                    inner.apply(Err(e), Favorite::Carry);
                }
            }
        });
    }

    /// Look up weather by city name. Blank names fail without a request.
    pub fn search_weather_by_city(&self, name: &str) {
        if self.is_shut_down() {
            return;
        }

        let city = match validate_city(name) {
            Ok(city) => city.to_string(),
            Err(e) => {
                self.inner.apply(Err(e), Favorite::Reset);
                return;
            }
        };

        self.inner.state.send_replace(ScreenState::Loading);

        let inner = self.inner.clone();
        self.inner.spawn(async move {
            tracing::info!("Searching weather for city: {}", city);
            let result = inner.backend.fetch_for_city(&city).await;
            if let Ok(snapshot) = &result {
                if let Some(coordinate) = snapshot.coordinate {
                    inner.remember(coordinate);
                }
            }
            inner.apply(result, Favorite::Reset);
        });
    }

    /// Flip the favorite flag of the shown snapshot. No-op otherwise.
    pub fn toggle_favorite(&self) {
        self.inner.state.send_if_modified(|state| match state {
            ScreenState::Success(snapshot) => {
                snapshot.is_favorite = !snapshot.is_favorite;
                tracing::debug!("Favorite set to {}", snapshot.is_favorite);
                true
            }
            _ => false,
        });
    }

    /// Follow live location updates, replacing any previous subscription.
    ///
    /// The previous subscription is cancelled and awaited before the new one
    /// starts, so the platform listener is released first.
    pub fn request_location_tracking(&self) {
        if self.is_shut_down() {
            return;
        }

        let mut slot = self.inner.tracking.lock();
        let previous = slot.take();
        let cancel = self.inner.cancel.child_token();

        let inner = self.inner.clone();
        let token = cancel.clone();
        let handle = self.inner.tasks.spawn_on(
            async move {
                if let Some(previous) = previous {
                    previous.cancel.cancel();
                    let _ = previous.handle.await;
                }
                inner.track(token).await;
            },
            &self.inner.runtime,
        );

        *slot = Some(Subscription { cancel, handle });
    }

    /// Stop live updates without shutting the model down.
    ///
    /// The cancelled subscription stays in its slot until the next
    /// [`Self::request_location_tracking`], which waits for it to release
    /// the platform listener.
    pub fn stop_location_tracking(&self) {
        if let Some(sub) = self.inner.tracking.lock().as_ref() {
            if !sub.cancel.is_cancelled() {
                tracing::info!("Stopping location tracking");
                sub.cancel.cancel();
            }
        }
    }

    /// Cancel the refresh loop, live tracking and in-flight fetches.
    ///
    /// Idempotent. Results still in flight are discarded.
    pub fn shutdown(&self) {
        if !self.inner.cancel.is_cancelled() {
            tracing::info!("Weather screen shutting down");
            self.inner.cancel.cancel();
        }
        self.inner.refresh_loop.lock().take();
        self.inner.tracking.lock().take();
        self.inner.tasks.close();
    }

    /// Resolves once every spawned task has finished after [`Self::shutdown`].
    pub async fn closed(&self) {
        self.inner.tasks.wait().await;
    }

    fn is_shut_down(&self) -> bool {
        if self.inner.cancel.is_cancelled() {
            tracing::debug!("Weather screen already shut down, ignoring trigger");
            return true;
        }
        false
    }

    /// (Re)start the periodic refresh for the last known location.
    pub fn start_auto_refresh(&self) {
        if self.is_shut_down() {
            return;
        }
        let token = self.inner.cancel.child_token();
        if let Some(previous) = self.inner.refresh_loop.lock().replace(token.clone()) {
            previous.cancel();
        }

        let inner = self.inner.clone();
        self.inner.tasks.spawn_on(
            async move {
                let mut ticker = tokio::time::interval(inner.refresh_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // First tick completes immediately
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }

                    let last = *inner.last_location.lock();
                    let Some(coordinate) = last else {
                        continue;
                    };
                    tracing::debug!("Auto-refreshing weather for {}", coordinate);

                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = inner.fetch_and_apply(coordinate) => {}
                    }
                }
                tracing::debug!("Auto-refresh loop stopped");
            },
            &self.inner.runtime,
        );
    }
}

impl Drop for WeatherModel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    /// Spawn a one-shot task that is abandoned on shutdown.
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.cancel.clone();
        self.tasks.spawn_on(
            async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = task => {}
                }
            },
            &self.runtime,
        );
    }

    fn remember(&self, coordinate: Coordinate) {
        *self.last_location.lock() = Some(coordinate);
    }

    async fn fetch_and_apply(&self, coordinate: Coordinate) {
        let result = self.backend.fetch_for_coordinate(coordinate).await;
        self.apply(result, Favorite::Carry);
    }

    async fn track(&self, token: CancellationToken) {
        let mut updates = self.backend.track();
        tracing::info!("Location tracking subscribed");

        loop {
            let update = tokio::select! {
                _ = token.cancelled() => break,
                update = updates.next() => update,
            };

            match update {
                Some(Ok(coordinate)) => {
                    tracing::debug!("Location update: {}", coordinate);
                    self.remember(coordinate);
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = self.fetch_and_apply(coordinate) => {}
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("Location tracking error: {}", e);
                    self.apply(Err(ScreenError::Tracking(e)), Favorite::Carry);
                    break;
                }
                None => {
                    tracing::info!("Location updates ended");
                    break;
                }
            }
        }
        // `updates` drops here and releases the platform listener
    }

    fn apply(&self, result: Result<WeatherSnapshot, ScreenError>, favorite: Favorite) {
        let cancel = &self.cancel;
        self.state.send_if_modified(|state| {
            if cancel.is_cancelled() {
                tracing::debug!("Discarding result that arrived after shutdown");
                return false;
            }

            *state = match result {
                Ok(snapshot) => {
                    let keep = favorite == Favorite::Carry && state.is_favorite();
                    tracing::info!("Weather updated for {}", snapshot.place_name);
                    ScreenState::Success(snapshot.with_favorite(keep))
                }
                Err(e) => {
                    let message = AppError::from(e).screen_message();
                    tracing::error!("Weather fetch failed: {}", message);
                    ScreenState::Error(message)
                }
            };
            true
        });
    }
}
