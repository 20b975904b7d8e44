//! Position acquisition on top of a callback-based platform location API.
//!
//! [`PositionSource`] turns the platform's listener registration into an
//! awaitable single fix ([`PositionSource::get_once`]) and into a
//! deduplicated update stream ([`PositionSource::stream`]). Every platform
//! registration is owned by a guard that deregisters the listener when the
//! guard goes away, whichever way the caller leaves.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::Stream;

use crate::types::{Coordinate, LocationError};

/// Identifier handed out by a platform for a registered listener
pub type ListenerId = u64;

/// Callback receiving the platform's cached fix
pub type LastKnownCallback = Box<dyn FnOnce(Result<Option<Coordinate>, LocationError>) + Send>;

const DEFAULT_INTERVAL_MS: u64 = 10_000;
const DEFAULT_MIN_UPDATE_INTERVAL_MS: u64 = 5_000;
const DEFAULT_MIN_DISTANCE_METERS: f32 = 10.0;
const DEFAULT_FIX_TIMEOUT_SECS: u64 = 30;

/// Accuracy hint passed to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    HighAccuracy,
    Balanced,
    LowPower,
}

/// Parameters of a live location request
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRequest {
    pub priority: Priority,
    pub interval: Duration,
    pub min_update_interval: Duration,
    pub min_distance_meters: f32,
    /// Whether the platform may hold back fixes until accuracy is high
    pub wait_for_accurate_location: bool,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            priority: Priority::HighAccuracy,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            min_update_interval: Duration::from_millis(DEFAULT_MIN_UPDATE_INTERVAL_MS),
            min_distance_meters: DEFAULT_MIN_DISTANCE_METERS,
            wait_for_accurate_location: false,
        }
    }
}

/// Receives callbacks for a live location request
pub trait LocationListener: Send + Sync {
    fn on_location(&self, fix: Coordinate);
    fn on_availability(&self, available: bool);
}

/// Platform positioning API, callback style.
///
/// Implementations may invoke callbacks from any thread, including
/// synchronously from inside the registering call.
pub trait LocationPlatform: Send + Sync {
    /// Deliver the cached fix, if any, to `callback` exactly once.
    fn last_known_location(&self, callback: LastKnownCallback);

    /// Start delivering fixes to `listener` until removed.
    fn request_location_updates(
        &self,
        request: &LocationRequest,
        listener: Arc<dyn LocationListener>,
    ) -> Result<ListenerId, LocationError>;

    fn remove_location_updates(&self, id: ListenerId);
}

/// Removes a platform listener when dropped.
struct Registration {
    platform: Arc<dyn LocationPlatform>,
    id: Option<ListenerId>,
}

impl Registration {
    fn new(platform: Arc<dyn LocationPlatform>, id: ListenerId) -> Self {
        Self {
            platform,
            id: Some(id),
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            tracing::debug!("Removing location listener {}", id);
            self.platform.remove_location_updates(id);
        }
    }
}

/// Clears the single-stream flag when dropped.
struct TrackingLock(Arc<AtomicBool>);

impl Drop for TrackingLock {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Resolves a pending single-fix request on the first callback.
struct SingleFixListener {
    tx: Mutex<Option<oneshot::Sender<Option<Coordinate>>>>,
}

impl SingleFixListener {
    fn resolve(&self, value: Option<Coordinate>) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(value);
        }
    }
}

impl LocationListener for SingleFixListener {
    fn on_location(&self, fix: Coordinate) {
        self.resolve(Some(fix));
    }

    fn on_availability(&self, available: bool) {
        if !available {
            self.resolve(None);
        }
    }
}

enum StreamEvent {
    Fix(Coordinate),
    Unavailable,
}

/// Pushes every callback into the update stream's channel.
struct StreamListener {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl LocationListener for StreamListener {
    fn on_location(&self, fix: Coordinate) {
        let _ = self.tx.send(StreamEvent::Fix(fix));
    }

    fn on_availability(&self, available: bool) {
        if !available {
            let _ = self.tx.send(StreamEvent::Unavailable);
        }
    }
}

/// Single-shot and continuous location access over a [`LocationPlatform`].
pub struct PositionSource {
    platform: Arc<dyn LocationPlatform>,
    request: LocationRequest,
    fix_timeout: Duration,
    tracking: Arc<AtomicBool>,
    last_fix: Mutex<Option<Coordinate>>,
}

impl PositionSource {
    pub fn new(platform: Arc<dyn LocationPlatform>) -> Self {
        Self::with_request(platform, LocationRequest::default())
    }

    pub fn with_request(platform: Arc<dyn LocationPlatform>, request: LocationRequest) -> Self {
        Self {
            platform,
            request,
            fix_timeout: Duration::from_secs(DEFAULT_FIX_TIMEOUT_SECS),
            tracking: Arc::new(AtomicBool::new(false)),
            last_fix: Mutex::new(None),
        }
    }

    /// Upper bound for the live request issued by [`Self::get_once`]
    pub fn with_fix_timeout(mut self, timeout: Duration) -> Self {
        self.fix_timeout = timeout;
        self
    }

    /// Most recent fix resolved by [`Self::get_once`]
    pub fn last_fix(&self) -> Option<Coordinate> {
        *self.last_fix.lock()
    }

    /// Whether an update stream currently holds the tracking slot
    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::Acquire)
    }

    /// Resolve the current position once.
    ///
    /// Uses the platform's cached fix when there is one, otherwise issues a
    /// bounded live request and waits for its first fix. Returns `None` on
    /// permission denial, unavailability or timeout.
    pub async fn get_once(&self) -> Option<Coordinate> {
        match self.last_known().await {
            Ok(Some(fix)) => {
                tracing::debug!("Using last known location {}", fix);
                *self.last_fix.lock() = Some(fix);
                return Some(fix);
            }
            Ok(None) => {}
            Err(LocationError::PermissionDenied) => {
                tracing::warn!("Location permission not granted");
                return None;
            }
            Err(e) => tracing::warn!("Error getting last location: {}", e),
        }

        let fix = self.request_single_fix().await;
        if let Some(fix) = fix {
            *self.last_fix.lock() = Some(fix);
        }
        fix
    }

    async fn last_known(&self) -> Result<Option<Coordinate>, LocationError> {
        let (tx, rx) = oneshot::channel();
        self.platform.last_known_location(Box::new(move |result| {
            let _ = tx.send(result);
        }));
        // Platform dropped the callback without calling it
        rx.await.unwrap_or(Err(LocationError::ServiceUnavailable))
    }

    async fn request_single_fix(&self) -> Option<Coordinate> {
        let (tx, rx) = oneshot::channel();
        let listener = Arc::new(SingleFixListener {
            tx: Mutex::new(Some(tx)),
        });

        let id = match self
            .platform
            .request_location_updates(&self.request, listener)
        {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Failed to request location updates: {}", e);
                return None;
            }
        };
        let _registration = Registration::new(self.platform.clone(), id);

        match tokio::time::timeout(self.fix_timeout, rx).await {
            Ok(Ok(fix)) => fix,
            Ok(Err(_)) => None,
            Err(_) => {
                tracing::warn!("No location fix within {:?}", self.fix_timeout);
                None
            }
        }
    }

    /// Start continuous location updates.
    ///
    /// Only one stream may be active per source: a concurrent second call
    /// yields a single [`LocationError::AlreadyTracking`] and ends. Dropping
    /// the returned stream deregisters the platform listener and frees the
    /// slot.
    pub fn stream(&self) -> LocationUpdates {
        if self
            .tracking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Location tracking already started");
            return LocationUpdates::failed(LocationError::AlreadyTracking);
        }
        let lock = TrackingLock(self.tracking.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Arc::new(StreamListener { tx: tx.clone() });

        let id = match self
            .platform
            .request_location_updates(&self.request, listener)
        {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Failed to start location tracking: {}", e);
                return LocationUpdates::failed(e);
            }
        };
        let registration = Registration::new(self.platform.clone(), id);

        self.platform.last_known_location(Box::new(move |result| {
            if let Ok(Some(fix)) = result {
                let _ = tx.send(StreamEvent::Fix(fix));
            }
        }));

        tracing::info!("Location tracking started");
        LocationUpdates {
            state: UpdatesState::Active {
                rx,
                last: None,
                _registration: registration,
                _lock: lock,
            },
        }
    }
}

enum UpdatesState {
    Failed(Option<LocationError>),
    Active {
        rx: mpsc::UnboundedReceiver<StreamEvent>,
        last: Option<Coordinate>,
        _registration: Registration,
        _lock: TrackingLock,
    },
    Done,
}

/// Continuous, deduplicated location fixes.
///
/// Created by [`PositionSource::stream`]. Ends when the platform reports
/// the provider unavailable.
pub struct LocationUpdates {
    state: UpdatesState,
}

impl LocationUpdates {
    fn failed(error: LocationError) -> Self {
        Self {
            state: UpdatesState::Failed(Some(error)),
        }
    }
}

impl Stream for LocationUpdates {
    type Item = Result<Coordinate, LocationError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let event = match &mut this.state {
                UpdatesState::Failed(error) => return Poll::Ready(error.take().map(Err)),
                UpdatesState::Done => return Poll::Ready(None),
                UpdatesState::Active { rx, .. } => ready!(rx.poll_recv(cx)),
            };

            match event {
                Some(StreamEvent::Fix(fix)) => {
                    if let UpdatesState::Active { last, .. } = &mut this.state {
                        if *last == Some(fix) {
                            continue;
                        }
                        *last = Some(fix);
                    }
                    return Poll::Ready(Some(Ok(fix)));
                }
                Some(StreamEvent::Unavailable) | None => {
                    tracing::info!("Location provider unavailable, ending updates");
                    // Releases the listener and the tracking slot
                    this.state = UpdatesState::Done;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

/// Platform stand-in that serves one configured position.
///
/// Used on hosts without a positioning service. Without a configured
/// position every request reports [`LocationError::PermissionDenied`].
pub struct FixedPositionPlatform {
    fix: Option<Coordinate>,
    next_id: AtomicU64,
    listeners: Mutex<HashMap<ListenerId, Arc<dyn LocationListener>>>,
}

impl FixedPositionPlatform {
    pub fn new(fix: Option<Coordinate>) -> Self {
        Self {
            fix,
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    pub fn active_listeners(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl LocationPlatform for FixedPositionPlatform {
    fn last_known_location(&self, callback: LastKnownCallback) {
        callback(self.fix.map(Some).ok_or(LocationError::PermissionDenied));
    }

    fn request_location_updates(
        &self,
        _request: &LocationRequest,
        listener: Arc<dyn LocationListener>,
    ) -> Result<ListenerId, LocationError> {
        let fix = self.fix.ok_or(LocationError::PermissionDenied)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, listener.clone());
        listener.on_location(fix);
        Ok(id)
    }

    fn remove_location_updates(&self, id: ListenerId) {
        self.listeners.lock().remove(&id);
    }
}
