//! Testing utilities for SubRoute workspace
//!
//! Fakes for every tracker collaborator, fixtures for the Brisbane test
//! trip, and a harness that wires them into a `TripTracker`.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subroute_core::{
    CompletedTripLog, Coordinate, LogId, NewStop, PositionError, StopId, TrackerConfig, UserId,
};
use subroute_tracker::simulator::FeedPositionSource;
use subroute_tracker::{
    Collaborators, PersistenceError, PositionEvent, PositionSource, PositionWatch, ResourceError,
    TrackerEvent, TripLogStore, TripTracker, WakeLock, WakeLockId, WatchId, WatchOptions,
};
use tokio::sync::{broadcast, Notify, Semaphore};

pub use subroute_tracker::store::{MemoryRecoveryStore, MemoryTripLogStore};
pub use subroute_tracker::ManualClock;

/// 2024-03-05 09:50 in Brisbane
pub const T0: i64 = 1_709_596_200_000;
/// Test trip origin, Brisbane CBD
pub const ORIGIN: Coordinate = Coordinate::new(-27.4698, 153.0251);
/// About 0.11 km from `ORIGIN`
pub const DESTINATION: Coordinate = Coordinate::new(-27.4705, 153.0260);

pub fn destination_stop() -> NewStop {
    NewStop::new("7 Flinders Parade, North Lakes").at(DESTINATION)
}

// ---- position source ----

/// Push-fed position source with failure injection
#[derive(Debug, Default)]
pub struct FakePositionSource {
    feed: FeedPositionSource,
    fail_next: Mutex<Option<String>>,
    unwatched: AtomicUsize,
}

impl FakePositionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: PositionEvent) -> usize {
        self.feed.push(event)
    }

    pub fn push_fix(&self, at: Coordinate) -> usize {
        self.feed.push(PositionEvent::Fix(at))
    }

    pub fn push_error(&self, error: PositionError) -> usize {
        self.feed.push(PositionEvent::Error(error))
    }

    /// Make the next `watch` call fail
    pub fn fail_next_watch(&self, reason: impl Into<String>) {
        *self.fail_next.lock() = Some(reason.into());
    }

    /// Close every open watch, as a hidden page may see
    pub fn close_all(&self) {
        self.feed.close_all();
    }

    pub fn open_watches(&self) -> usize {
        self.feed.open_watches()
    }

    pub fn watches_started(&self) -> u64 {
        self.feed.watches_started()
    }

    pub fn unwatch_calls(&self) -> usize {
        self.unwatched.load(Ordering::SeqCst)
    }
}

impl PositionSource for FakePositionSource {
    fn watch(&self, options: WatchOptions) -> Result<PositionWatch, ResourceError> {
        if let Some(reason) = self.fail_next.lock().take() {
            return Err(ResourceError::WatchUnavailable(reason));
        }
        self.feed.watch(options)
    }

    fn unwatch(&self, id: WatchId) {
        self.unwatched.fetch_add(1, Ordering::SeqCst);
        self.feed.unwatch(id);
    }
}

// ---- wake lock ----

/// Wake lock whose grants can be revoked or refused
#[derive(Debug, Default)]
pub struct FakeWakeLock {
    next_id: AtomicU64,
    held: Mutex<HashSet<WakeLockId>>,
    refuse: Mutex<bool>,
    acquisitions: AtomicUsize,
}

impl FakeWakeLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every grant, as a platform does when the page is hidden
    pub fn revoke_all(&self) {
        self.held.lock().clear();
    }

    pub fn set_refuse(&self, refuse: bool) {
        *self.refuse.lock() = refuse;
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl WakeLock for FakeWakeLock {
    fn acquire(&self) -> Result<WakeLockId, ResourceError> {
        if *self.refuse.lock() {
            return Err(ResourceError::WakeLockUnavailable("refused".to_string()));
        }
        let id = WakeLockId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.held.lock().insert(id);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn release(&self, id: WakeLockId) {
        self.held.lock().remove(&id);
    }

    fn is_held(&self, id: WakeLockId) -> bool {
        self.held.lock().contains(&id)
    }
}

// ---- trip-log store ----

/// Trip-log store with scripted failures and write gating
#[derive(Debug, Default)]
pub struct ScriptedTripLogStore {
    inner: MemoryTripLogStore,
    failures: Mutex<VecDeque<String>>,
    vehicle_lookup_fails: Mutex<bool>,
    log_lookup_fails: Mutex<bool>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    write_started: Notify,
    save_calls: AtomicUsize,
}

impl ScriptedTripLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next save with `message`
    pub fn fail_next_save(&self, message: impl Into<String>) {
        self.failures.lock().push_back(message.into());
    }

    pub fn fail_vehicle_lookup(&self, fail: bool) {
        *self.vehicle_lookup_fails.lock() = fail;
    }

    /// Make `logged_stops` fail, as an offline backend would on reload
    pub fn fail_log_lookup(&self, fail: bool) {
        *self.log_lookup_fails.lock() = fail;
    }

    pub fn set_vehicle_label(&self, user: &UserId, label: impl Into<String>) {
        self.inner.set_vehicle_label(user, label);
    }

    /// Block saves until `release_writes` is called
    pub fn hold_writes(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held saves through
    pub fn release_writes(&self, n: usize) {
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.add_permits(n);
        }
    }

    /// Resolves once a save has started
    pub async fn write_started(&self) {
        self.write_started.notified().await;
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn logs(&self, user: &UserId) -> Vec<CompletedTripLog> {
        self.inner.logs(user)
    }
}

#[async_trait]
impl TripLogStore for ScriptedTripLogStore {
    async fn save_trip_log(
        &self,
        user: &UserId,
        log: &CompletedTripLog,
    ) -> Result<(), PersistenceError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.write_started.notify_one();

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| PersistenceError::Backend(e.to_string()))?;
            permit.forget();
        }

        if let Some(message) = self.failures.lock().pop_front() {
            return Err(PersistenceError::Backend(message));
        }
        self.inner.save_trip_log(user, log).await
    }

    async fn default_vehicle_label(
        &self,
        user: &UserId,
    ) -> Result<Option<String>, PersistenceError> {
        if *self.vehicle_lookup_fails.lock() {
            return Err(PersistenceError::Backend("vehicles unavailable".to_string()));
        }
        self.inner.default_vehicle_label(user).await
    }

    async fn logged_stops(&self, user: &UserId) -> Result<HashMap<StopId, LogId>, PersistenceError> {
        if *self.log_lookup_fails.lock() {
            return Err(PersistenceError::Backend("trip logs unavailable".to_string()));
        }
        self.inner.logged_stops(user).await
    }
}

// ---- harness ----

/// A tracker wired to fakes, plus handles to the fakes
pub struct TestHarness {
    pub user: UserId,
    pub config: TrackerConfig,
    pub positions: Arc<FakePositionSource>,
    pub wake_lock: Arc<FakeWakeLock>,
    pub trip_logs: Arc<ScriptedTripLogStore>,
    pub recovery: Arc<MemoryRecoveryStore>,
    pub clock: Arc<ManualClock>,
    pub tracker: TripTracker,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        let positions = Arc::new(FakePositionSource::new());
        let wake_lock = Arc::new(FakeWakeLock::new());
        let trip_logs = Arc::new(ScriptedTripLogStore::new());
        let recovery = Arc::new(MemoryRecoveryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let user = UserId::new("driver-1");
        let deps = collaborators(&positions, &wake_lock, &trip_logs, &recovery, &clock);
        let tracker = TripTracker::new(user.clone(), config.clone(), deps);
        Self {
            user,
            config,
            positions,
            wake_lock,
            trip_logs,
            recovery,
            clock,
            tracker,
        }
    }

    /// A new tracker restored from this harness's recovery store, as after
    /// a page reload
    pub async fn reload(&self) -> TripTracker {
        let deps = collaborators(
            &self.positions,
            &self.wake_lock,
            &self.trip_logs,
            &self.recovery,
            &self.clock,
        );
        TripTracker::restore(self.user.clone(), self.config.clone(), deps).await
    }

    pub fn logs(&self) -> Vec<CompletedTripLog> {
        self.trip_logs.logs(&self.user)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn collaborators(
    positions: &Arc<FakePositionSource>,
    wake_lock: &Arc<FakeWakeLock>,
    trip_logs: &Arc<ScriptedTripLogStore>,
    recovery: &Arc<MemoryRecoveryStore>,
    clock: &Arc<ManualClock>,
) -> Collaborators {
    Collaborators::new(
        positions.clone(),
        wake_lock.clone(),
        trip_logs.clone(),
        recovery.clone(),
    )
    .with_clock(clock.clone())
}

/// Wait up to one second for an event matching `pred`
pub async fn wait_for_event<F>(rx: &mut broadcast::Receiver<TrackerEvent>, pred: F) -> Option<TrackerEvent>
where
    F: Fn(&TrackerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Give spawned tasks a chance to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
