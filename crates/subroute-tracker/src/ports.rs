//! Collaborator contracts
//!
//! The tracker never talks to the platform directly. Position fixes, the
//! wake lock, durable storage and the external navigation app all sit
//! behind these traits so they can be swapped for fakes in tests.

use crate::clock::{Clock, SystemClock};
use crate::error::{PersistenceError, ResourceError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use subroute_core::{
    CompletedTripLog, Coordinate, LogId, PositionError, RecoverySnapshot, StopId, TrackerConfig,
    UserId,
};
use tokio::sync::mpsc;

/// Handle for one position subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Handle for one wake-lock grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WakeLockId(pub u64);

/// One delivery from the position source
#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Fix(Coordinate),
    Error(PositionError),
}

/// Options passed to `PositionSource::watch`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub max_age_ms: u64,
    pub update_interval_ms: u64,
}

impl From<&TrackerConfig> for WatchOptions {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout_ms: config.timeout_ms,
            max_age_ms: config.max_age_ms,
            update_interval_ms: config.update_interval_ms,
        }
    }
}

/// An active position subscription. Events arrive in delivery order and
/// the channel closes when the source drops its sender.
#[derive(Debug)]
pub struct PositionWatch {
    pub id: WatchId,
    pub events: mpsc::UnboundedReceiver<PositionEvent>,
}

/// Live position stream (platform geolocation)
pub trait PositionSource: Send + Sync {
    /// Start a subscription
    fn watch(&self, options: WatchOptions) -> Result<PositionWatch, ResourceError>;

    /// Stop a subscription; unknown ids are ignored
    fn unwatch(&self, id: WatchId);
}

/// Screen wake lock
///
/// Platforms may revoke a grant while the page is hidden, so holders check
/// `is_held` before assuming the screen will stay on.
pub trait WakeLock: Send + Sync {
    fn acquire(&self) -> Result<WakeLockId, ResourceError>;
    fn release(&self, id: WakeLockId);
    fn is_held(&self, id: WakeLockId) -> bool;
}

/// Durable trip-log storage
///
/// Saves must be idempotent on `CompletedTripLog::id`.
#[async_trait]
pub trait TripLogStore: Send + Sync {
    async fn save_trip_log(
        &self,
        user: &UserId,
        log: &CompletedTripLog,
    ) -> Result<(), PersistenceError>;

    /// Label of the user's default vehicle, if one is set
    async fn default_vehicle_label(&self, user: &UserId)
        -> Result<Option<String>, PersistenceError>;

    /// Id of the stored log for each stop the user has a log for. When a
    /// stop has several, the latest saved wins.
    async fn logged_stops(&self, user: &UserId) -> Result<HashMap<StopId, LogId>, PersistenceError>;
}

/// Per-user recovery snapshot storage
#[async_trait]
pub trait RecoveryStore: Send + Sync {
    async fn load(&self, user: &UserId) -> Result<Option<RecoverySnapshot>, PersistenceError>;
    async fn save(&self, user: &UserId, snapshot: &RecoverySnapshot)
        -> Result<(), PersistenceError>;
}

/// Opens deep links in an external navigation app. Fire-and-forget.
pub trait NavigationLauncher: Send + Sync {
    fn open(&self, url: &str);
}

/// Launcher that only logs the link
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyLauncher;

impl NavigationLauncher for LogOnlyLauncher {
    fn open(&self, url: &str) {
        tracing::info!(url, "navigation link");
    }
}

/// Position source that never produces fixes
///
/// Used where no platform geolocation exists; every trip is text-only
/// tracking and completes manually.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPositionSource;

impl PositionSource for NoPositionSource {
    fn watch(&self, _options: WatchOptions) -> Result<PositionWatch, ResourceError> {
        Err(ResourceError::WatchUnavailable(
            "no position source configured".to_string(),
        ))
    }

    fn unwatch(&self, _id: WatchId) {}
}

/// Everything the tracker depends on
#[derive(Clone)]
pub struct Collaborators {
    pub positions: Arc<dyn PositionSource>,
    pub wake_lock: Arc<dyn WakeLock>,
    pub trip_logs: Arc<dyn TripLogStore>,
    pub recovery: Arc<dyn RecoveryStore>,
    pub launcher: Arc<dyn NavigationLauncher>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Collaborators with a log-only launcher and the system clock
    pub fn new(
        positions: Arc<dyn PositionSource>,
        wake_lock: Arc<dyn WakeLock>,
        trip_logs: Arc<dyn TripLogStore>,
        recovery: Arc<dyn RecoveryStore>,
    ) -> Self {
        Self {
            positions,
            wake_lock,
            trip_logs,
            recovery,
            launcher: Arc::new(LogOnlyLauncher),
            clock: Arc::new(SystemClock),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn NavigationLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
