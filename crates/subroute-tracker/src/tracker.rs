//! Trip tracker state machine
//!
//! `Idle -> Tracking -> (logged | abandoned) -> Idle`, with at most one
//! active trip. All session state sits behind one async mutex; position
//! events, manual completion and plan edits are serialized through it.
//!
//! # Completion
//!
//! Logging a trip happens in three steps:
//! 1. Under the lock, the completion is claimed: the stop must be the
//!    active destination, not already in the completed set, and no other
//!    completion may be in flight. Position processing for the trip stops.
//! 2. Without the lock, the log is written through the persistence bridge.
//! 3. Under the lock again, the result is applied only if the same trip is
//!    still active. Abandon or clear during the write makes it stale.
//!
//! A failed write leaves the trip active so completion can be retried.

use crate::bridge::PersistenceBridge;
use crate::error::TrackerError;
use crate::ports::{Collaborators, PositionEvent, PositionWatch, WatchId, WatchOptions};
use crate::resources::TrackingResources;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use subroute_core::validation::{validate_address, validate_coordinate};
use subroute_core::{
    deep_link, navigate_all_link, ActiveTrip, ArrivalDetector, CompletedTripLog, Coordinate,
    LogId, NewStop, PositionError, RecoverySnapshot, Stop, StopId, StopStore, TrackerConfig,
    TripId, UserId, ValidationError,
};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Origin label when the caller gives none
pub const DEFAULT_ORIGIN_LABEL: &str = "Current Location";

const EVENT_CAPACITY: usize = 256;

/// Notifications for the UI layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent {
    TripStarted {
        trip_id: TripId,
        stop_id: StopId,
        /// False for text-only destinations, which complete manually
        can_detect_arrival: bool,
    },
    DistanceUpdated {
        trip_id: TripId,
        distance_km: f64,
        distance_to_destination_km: Option<f64>,
    },
    Arrived {
        trip_id: TripId,
        stop_id: StopId,
    },
    TripLogged {
        log: CompletedTripLog,
    },
    /// Position source failed; the trip is still active
    TrackingDegraded {
        trip_id: TripId,
        error: PositionError,
        message: String,
    },
    /// The trip log could not be written; the trip is still active
    PersistenceFailed {
        trip_id: TripId,
        stop_id: StopId,
        message: String,
    },
    TripAbandoned {
        trip_id: TripId,
        stop_id: StopId,
    },
    PlanCleared,
    ResourcesReacquired {
        trip_id: TripId,
        watch: bool,
        wake_lock: bool,
    },
}

/// Result of a completion request
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// This call created the log
    Logged(CompletedTripLog),
    /// The stop was already logged or is being logged; nothing was written.
    /// `log_id` identifies the earlier record when it is known.
    Duplicate { stop_id: StopId, log_id: Option<LogId> },
    /// The trip was abandoned or cleared while its log was being written
    Discarded { trip_id: TripId, log_id: Option<LogId> },
}

impl Completion {
    #[must_use]
    pub fn log(&self) -> Option<&CompletedTripLog> {
        match self {
            Self::Logged(log) => Some(log),
            _ => None,
        }
    }
}

/// View of the active trip
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingStatus {
    pub trip: ActiveTrip,
    /// Last position-source failure, cleared by the next fix
    pub degraded: Option<PositionError>,
    pub arrived: bool,
    /// A trip-log write is in flight
    pub completing: bool,
}

/// Current tracker state
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerState {
    Idle,
    Tracking(Box<TrackingStatus>),
}

impl TrackerState {
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    #[must_use]
    pub fn active_trip(&self) -> Option<&ActiveTrip> {
        match self {
            Self::Idle => None,
            Self::Tracking(status) => Some(&status.trip),
        }
    }
}

pub(crate) struct Session {
    pub(crate) stops: StopStore,
    pub(crate) completed: BTreeSet<StopId>,
    logged: HashMap<StopId, LogId>,
    pub(crate) tracking: Option<Tracking>,
}

pub(crate) struct Tracking {
    pub(crate) trip: ActiveTrip,
    pub(crate) detector: ArrivalDetector,
    completing: bool,
    pub(crate) resources: TrackingResources,
}

impl Session {
    fn empty() -> Self {
        Self {
            stops: StopStore::new(),
            completed: BTreeSet::new(),
            logged: HashMap::new(),
            tracking: None,
        }
    }

    fn snapshot(&self) -> RecoverySnapshot {
        RecoverySnapshot {
            stops: self.stops.as_slice().to_vec(),
            active_trip: self.tracking.as_ref().map(|t| t.trip.clone()),
            completed_stops: self.completed.clone(),
        }
    }

    fn is_active_destination(&self, stop_id: StopId) -> bool {
        self.tracking.as_ref().is_some_and(|t| t.trip.stop_id == stop_id)
    }
}

/// Where a position event came from
#[derive(Debug, Clone, Copy)]
enum EventOrigin {
    /// Delivered by the watch pump for a specific trip
    Watch { trip_id: TripId, watch: WatchId },
    /// Fed in directly by the caller for whatever trip is active
    Caller,
}

/// A claimed completion, to be written outside the lock
pub(crate) struct CompletionTicket {
    trip: ActiveTrip,
}

enum Claim {
    Ticket(CompletionTicket),
    Done(Completion),
}

pub(crate) struct Inner {
    user: UserId,
    config: TrackerConfig,
    pub(crate) deps: Collaborators,
    bridge: PersistenceBridge,
    pub(crate) session: Mutex<Session>,
    events: broadcast::Sender<TrackerEvent>,
}

/// Handle to one user's planning and tracking session.
///
/// Cheap to clone; all clones share the same session.
#[derive(Clone)]
pub struct TripTracker {
    pub(crate) inner: Arc<Inner>,
}

impl TripTracker {
    /// Tracker with an empty plan
    pub fn new(user: UserId, config: TrackerConfig, deps: Collaborators) -> Self {
        let bridge = PersistenceBridge::new(deps.trip_logs.clone(), deps.clock.clone(), &config);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                user,
                config,
                deps,
                bridge,
                session: Mutex::new(Session::empty()),
                events,
            }),
        }
    }

    /// Tracker resumed from the user's recovery snapshot.
    ///
    /// An unreadable snapshot is logged and the session starts empty. A
    /// recovered active trip resumes tracking with its running distance.
    pub async fn restore(user: UserId, config: TrackerConfig, deps: Collaborators) -> Self {
        let tracker = Self::new(user, config, deps);
        let snapshot = match tracker.inner.deps.recovery.load(&tracker.inner.user).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(user = %tracker.inner.user, error = %e, "recovery snapshot unreadable, starting empty");
                None
            }
        };
        if let Some(snapshot) = snapshot {
            tracker.apply_snapshot(snapshot).await;
            tracker.restore_logged().await;
        }
        tracker
    }

    /// Recover which log belongs to each completed stop, so duplicate
    /// completions after a reload still name the earlier record.
    async fn restore_logged(&self) {
        let logged = match self.inner.deps.trip_logs.logged_stops(&self.inner.user).await {
            Ok(logged) => logged,
            Err(e) => {
                warn!(user = %self.inner.user, error = %e, "trip log lookup failed, duplicates will not name their log");
                return;
            }
        };
        let mut session = self.inner.session.lock().await;
        let session = &mut *session;
        session.logged = logged
            .into_iter()
            .filter(|(stop_id, _)| session.completed.contains(stop_id))
            .collect();
        debug!(logged = session.logged.len(), "completed stops matched to logs");
    }

    async fn apply_snapshot(&self, snapshot: RecoverySnapshot) {
        let mut session = self.inner.session.lock().await;
        session.stops = StopStore::from_stops(snapshot.stops);
        session.completed = snapshot.completed_stops;

        let Some(trip) = snapshot.active_trip else {
            info!(stops = session.stops.len(), "plan restored");
            return;
        };
        let resumable = session.stops.get(trip.stop_id).is_some_and(Stop::is_pending)
            && !session.completed.contains(&trip.stop_id);
        if !resumable {
            warn!(trip_id = %trip.id, stop_id = %trip.stop_id, "recovered trip has no pending destination, dropping it");
            drop(session);
            self.persist_current().await;
            return;
        }

        let detector = ArrivalDetector::resume(
            trip.destination_location,
            self.inner.config.arrival_radius_km,
            trip.last_position,
            trip.distance_traveled,
        );
        let mut tracking = Tracking {
            trip,
            detector,
            completing: false,
            resources: TrackingResources::default(),
        };
        self.acquire_watch(&mut tracking);
        self.acquire_wake_lock(&mut tracking);
        info!(
            trip_id = %tracking.trip.id,
            stop_id = %tracking.trip.stop_id,
            distance_km = tracking.trip.distance_traveled,
            "resumed tracking recovered trip"
        );
        session.tracking = Some(tracking);
    }

    #[inline]
    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.inner.user
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Receive tracker notifications from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.inner.events.subscribe()
    }

    // ---- plan ----

    /// Append a stop to the plan.
    ///
    /// # Errors
    /// Blank addresses and out-of-range coordinates are rejected.
    pub async fn add_stop(&self, draft: NewStop) -> Result<StopId, ValidationError> {
        validate_address(&draft.address)?;
        if let Some(location) = draft.location {
            validate_coordinate(location)?;
        }
        let mut session = self.inner.session.lock().await;
        let id = session.stops.add(draft).ok_or(ValidationError::EmptyAddress)?;
        debug!(stop_id = %id, "stop added");
        self.persist(&session).await;
        Ok(id)
    }

    /// Remove a stop. The active trip's destination cannot be removed.
    pub async fn remove_stop(&self, stop_id: StopId) -> bool {
        let mut session = self.inner.session.lock().await;
        if session.is_active_destination(stop_id) {
            warn!(stop_id = %stop_id, "refusing to remove the active destination");
            return false;
        }
        let removed = session.stops.remove(stop_id).is_some();
        if removed {
            self.persist(&session).await;
        }
        removed
    }

    /// Mark a pending stop skipped. The active destination cannot be skipped.
    pub async fn skip_stop(&self, stop_id: StopId) -> bool {
        let mut session = self.inner.session.lock().await;
        if session.is_active_destination(stop_id) {
            warn!(stop_id = %stop_id, "refusing to skip the active destination");
            return false;
        }
        let skipped = session.stops.mark_skipped(stop_id);
        if skipped {
            self.persist(&session).await;
        }
        skipped
    }

    pub async fn reorder_stops(&self, from: usize, to: usize) -> bool {
        let mut session = self.inner.session.lock().await;
        let moved = session.stops.reorder(from, to);
        if moved {
            self.persist(&session).await;
        }
        moved
    }

    /// Reorder pending stops nearest-neighbor from `start`
    pub async fn optimize_stops(&self, start: Coordinate) -> bool {
        let mut session = self.inner.session.lock().await;
        let changed = session.stops.optimize(start);
        if changed {
            info!(stops = session.stops.len(), "stops reordered by distance");
            self.persist(&session).await;
        }
        changed
    }

    pub async fn stops(&self) -> Vec<Stop> {
        self.inner.session.lock().await.stops.as_slice().to_vec()
    }

    pub async fn completed_stops(&self) -> BTreeSet<StopId> {
        self.inner.session.lock().await.completed.clone()
    }

    // ---- trip lifecycle ----

    /// Start tracking a trip to `stop_id`.
    ///
    /// A destination without coordinates still starts a trip, but only
    /// manual completion can log it. Position watch and wake lock failures
    /// degrade tracking instead of failing the call.
    ///
    /// # Errors
    /// - `TripAlreadyActive` if a trip is being tracked
    /// - `UnknownStop` / `StopNotPending` for an unusable destination
    pub async fn start_trip(
        &self,
        origin_label: &str,
        origin_location: Option<Coordinate>,
        stop_id: StopId,
    ) -> Result<ActiveTrip, TrackerError> {
        let mut session = self.inner.session.lock().await;
        if let Some(active) = &session.tracking {
            return Err(TrackerError::TripAlreadyActive {
                active_stop: active.trip.stop_id,
            });
        }
        let stop = session
            .stops
            .get(stop_id)
            .ok_or(TrackerError::UnknownStop(stop_id))?;
        if !stop.is_pending() || session.completed.contains(&stop_id) {
            return Err(TrackerError::StopNotPending(stop_id));
        }

        let origin = match origin_label.trim() {
            "" => DEFAULT_ORIGIN_LABEL.to_string(),
            label => label.to_string(),
        };
        let origin_location = origin_location.filter(|loc| {
            let valid = loc.is_valid();
            if !valid {
                warn!(lat = loc.lat, lng = loc.lng, "ignoring invalid origin coordinate");
            }
            valid
        });

        let trip = ActiveTrip {
            id: TripId::new(),
            stop_id,
            origin,
            origin_location,
            destination: stop.address.clone(),
            destination_location: stop.location,
            start_time: self.inner.deps.clock.now_ms(),
            distance_traveled: 0.0,
            last_position: None,
        };
        let detector = ArrivalDetector::new(trip.destination_location, self.inner.config.arrival_radius_km);
        let can_detect_arrival = detector.can_detect();
        let mut tracking = Tracking {
            trip: trip.clone(),
            detector,
            completing: false,
            resources: TrackingResources::default(),
        };

        if can_detect_arrival {
            info!(trip_id = %trip.id, stop_id = %stop_id, destination = %trip.destination, "trip started");
        } else {
            info!(
                trip_id = %trip.id,
                stop_id = %stop_id,
                destination = %trip.destination,
                "text-only trip started, arrival must be completed manually"
            );
        }
        self.emit(TrackerEvent::TripStarted {
            trip_id: trip.id,
            stop_id,
            can_detect_arrival,
        });

        self.acquire_watch(&mut tracking);
        self.acquire_wake_lock(&mut tracking);
        session.tracking = Some(tracking);
        self.persist(&session).await;
        Ok(trip)
    }

    /// Start a trip and open the configured navigation app on it.
    ///
    /// Returns the deep link that was opened.
    pub async fn start_navigation(
        &self,
        origin_label: &str,
        origin_location: Option<Coordinate>,
        stop_id: StopId,
    ) -> Result<String, TrackerError> {
        let trip = self.start_trip(origin_label, origin_location, stop_id).await?;
        let stop = {
            let session = self.inner.session.lock().await;
            session.stops.get(trip.stop_id).cloned()
        };
        let url = match stop {
            Some(stop) => deep_link(self.inner.config.nav_app, &stop, self.inner.config.avoid_tolls),
            None => return Err(TrackerError::UnknownStop(trip.stop_id)),
        };
        self.inner.deps.launcher.open(&url);
        Ok(url)
    }

    /// Open every pending stop in one multi-stop route.
    ///
    /// Starts no tracking: trips driven this way are not logged.
    pub async fn navigate_all(&self) -> Option<String> {
        let url = {
            let session = self.inner.session.lock().await;
            navigate_all_link(session.stops.as_slice(), self.inner.config.avoid_tolls)
        }?;
        info!("multi-stop navigation opened, trips will not be tracked");
        self.inner.deps.launcher.open(&url);
        Some(url)
    }

    /// Feed one position event for the active trip.
    ///
    /// If it triggers arrival, the trip is logged before this returns.
    pub async fn handle_position(
        &self,
        event: PositionEvent,
    ) -> Result<Option<Completion>, TrackerError> {
        match self.dispatch(EventOrigin::Caller, event).await {
            Some(ticket) => self.finish_completion(ticket).await.map(Some),
            None => Ok(None),
        }
    }

    /// Complete the active trip by hand.
    ///
    /// Also the retry path after a failed log write.
    ///
    /// # Errors
    /// - `NoActiveTripForStop` if `stop_id` is not the active destination
    /// - `Persistence` if the log could not be written
    pub async fn manual_complete(&self, stop_id: StopId) -> Result<Completion, TrackerError> {
        let claim = {
            let mut session = self.inner.session.lock().await;
            claim_completion(&mut session, stop_id)?
        };
        match claim {
            Claim::Done(done) => {
                debug!(stop_id = %stop_id, "duplicate completion absorbed");
                Ok(done)
            }
            Claim::Ticket(ticket) => {
                info!(trip_id = %ticket.trip.id, stop_id = %stop_id, "manual completion");
                self.finish_completion(ticket).await
            }
        }
    }

    /// Cancel the active trip without logging it.
    ///
    /// Returns `false` when idle. The stop stays pending.
    pub async fn abandon(&self) -> bool {
        let mut session = self.inner.session.lock().await;
        let Some(mut tracking) = session.tracking.take() else {
            return false;
        };
        tracking.resources.release(&self.inner.deps);
        info!(
            trip_id = %tracking.trip.id,
            stop_id = %tracking.trip.stop_id,
            distance_km = tracking.trip.distance_traveled,
            "trip abandoned"
        );
        self.emit(TrackerEvent::TripAbandoned {
            trip_id: tracking.trip.id,
            stop_id: tracking.trip.stop_id,
        });
        self.persist(&session).await;
        true
    }

    /// Discard the whole plan, the completed set and any active trip
    pub async fn clear_all(&self) {
        let mut session = self.inner.session.lock().await;
        if let Some(mut tracking) = session.tracking.take() {
            tracking.resources.release(&self.inner.deps);
            info!(trip_id = %tracking.trip.id, "active trip discarded with plan");
        }
        let stops = session.stops.len();
        *session = Session::empty();
        info!(stops, "plan cleared");
        self.emit(TrackerEvent::PlanCleared);
        self.persist(&session).await;
    }

    // ---- queries ----

    pub async fn state(&self) -> TrackerState {
        let session = self.inner.session.lock().await;
        match &session.tracking {
            None => TrackerState::Idle,
            Some(t) => TrackerState::Tracking(Box::new(TrackingStatus {
                trip: t.trip.clone(),
                degraded: t.detector.last_error().cloned(),
                arrived: t.detector.has_arrived(),
                completing: t.completing,
            })),
        }
    }

    pub async fn active_trip(&self) -> Option<ActiveTrip> {
        let session = self.inner.session.lock().await;
        session.tracking.as_ref().map(|t| t.trip.clone())
    }

    /// What would be persisted right now
    pub async fn snapshot(&self) -> RecoverySnapshot {
        self.inner.session.lock().await.snapshot()
    }

    // ---- internals ----

    async fn dispatch(&self, origin: EventOrigin, event: PositionEvent) -> Option<CompletionTicket> {
        let mut session = self.inner.session.lock().await;
        let tracking = session.tracking.as_mut()?;

        if let EventOrigin::Watch { trip_id, watch } = origin {
            if tracking.trip.id != trip_id || tracking.resources.watch_id() != Some(watch) {
                debug!(watch = watch.0, "dropping event from a released watch");
                return None;
            }
        }
        if tracking.completing {
            return None;
        }

        let trip_id = tracking.trip.id;
        match event {
            PositionEvent::Error(e) => {
                tracking.detector.on_error(e.clone());
                warn!(trip_id = %trip_id, error = %e, "tracking degraded");
                let message = e.user_message();
                self.emit(TrackerEvent::TrackingDegraded {
                    trip_id,
                    error: e,
                    message,
                });
                None
            }
            PositionEvent::Fix(fix) => {
                if !fix.is_valid() {
                    warn!(trip_id = %trip_id, lat = fix.lat, lng = fix.lng, "ignoring invalid fix");
                    return None;
                }
                let outcome = tracking.detector.on_position(fix);
                tracking.trip.distance_traveled = outcome.total_km;
                tracking.trip.last_position = Some(fix);
                debug!(
                    trip_id = %trip_id,
                    distance_km = outcome.total_km,
                    to_destination_km = outcome.distance_to_destination_km,
                    "position update"
                );
                self.emit(TrackerEvent::DistanceUpdated {
                    trip_id,
                    distance_km: outcome.total_km,
                    distance_to_destination_km: outcome.distance_to_destination_km,
                });

                let ticket = if outcome.arrived {
                    let stop_id = tracking.trip.stop_id;
                    info!(trip_id = %trip_id, stop_id = %stop_id, distance_km = outcome.total_km, "arrived");
                    self.emit(TrackerEvent::Arrived { trip_id, stop_id });
                    match claim_completion(&mut session, stop_id) {
                        Ok(Claim::Ticket(ticket)) => Some(ticket),
                        Ok(Claim::Done(_)) | Err(_) => None,
                    }
                } else {
                    None
                };
                self.persist(&session).await;
                ticket
            }
        }
    }

    async fn finish_completion(&self, ticket: CompletionTicket) -> Result<Completion, TrackerError> {
        let trip = ticket.trip;
        let result = self.inner.bridge.complete(&self.inner.user, &trip).await;

        let mut session = self.inner.session.lock().await;
        let still_active = session.tracking.as_ref().is_some_and(|t| t.trip.id == trip.id);
        if !still_active {
            let log_id = result.as_ref().ok().map(|log| log.id);
            warn!(trip_id = %trip.id, log_id = ?log_id, "completion finished after trip ended, ignoring");
            return Ok(Completion::Discarded {
                trip_id: trip.id,
                log_id,
            });
        }

        match result {
            Err(e) => {
                if let Some(tracking) = session.tracking.as_mut() {
                    tracking.completing = false;
                }
                error!(trip_id = %trip.id, stop_id = %trip.stop_id, error = %e, "failed to save trip log");
                self.emit(TrackerEvent::PersistenceFailed {
                    trip_id: trip.id,
                    stop_id: trip.stop_id,
                    message: e.to_string(),
                });
                Err(e.into())
            }
            Ok(log) => {
                if let Some(mut tracking) = session.tracking.take() {
                    tracking.resources.release(&self.inner.deps);
                }
                session.stops.mark_completed(trip.stop_id, log.timestamp);
                session.completed.insert(trip.stop_id);
                session.logged.insert(trip.stop_id, log.id);
                info!(
                    trip_id = %trip.id,
                    stop_id = %trip.stop_id,
                    distance_km = log.distance_km,
                    "trip logged"
                );
                self.emit(TrackerEvent::TripLogged { log: log.clone() });
                self.persist(&session).await;
                Ok(Completion::Logged(log))
            }
        }
    }

    /// Start a position watch for `tracking`, degrading on failure
    pub(crate) fn acquire_watch(&self, tracking: &mut Tracking) -> bool {
        let options = WatchOptions::from(&self.inner.config);
        match self.inner.deps.positions.watch(options) {
            Ok(watch) => {
                let id = watch.id;
                let pump = spawn_pump(Arc::downgrade(&self.inner), tracking.trip.id, watch);
                tracking.resources.attach_watch(id, pump);
                true
            }
            Err(e) => {
                let error = PositionError::Unavailable(e.to_string());
                tracking.detector.on_error(error.clone());
                warn!(trip_id = %tracking.trip.id, error = %e, "position watch unavailable, tracking degraded");
                let message = error.user_message();
                self.emit(TrackerEvent::TrackingDegraded {
                    trip_id: tracking.trip.id,
                    error,
                    message,
                });
                false
            }
        }
    }

    /// Take the wake lock for `tracking`; a refusal is only logged
    pub(crate) fn acquire_wake_lock(&self, tracking: &mut Tracking) -> bool {
        match self.inner.deps.wake_lock.acquire() {
            Ok(id) => {
                tracking.resources.attach_wake_lock(id);
                true
            }
            Err(e) => {
                warn!(trip_id = %tracking.trip.id, error = %e, "wake lock unavailable");
                false
            }
        }
    }

    pub(crate) fn emit(&self, event: TrackerEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    pub(crate) async fn persist(&self, session: &Session) {
        let snapshot = session.snapshot();
        if let Err(e) = self.inner.deps.recovery.save(&self.inner.user, &snapshot).await {
            warn!(user = %self.inner.user, error = %e, "failed to save recovery snapshot");
        }
    }

    async fn persist_current(&self) {
        let session = self.inner.session.lock().await;
        self.persist(&session).await;
    }
}

impl std::fmt::Debug for TripTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripTracker")
            .field("user", &self.inner.user)
            .finish_non_exhaustive()
    }
}

/// Claim the completion of `stop_id`: the at-most-once linearization point.
fn claim_completion(session: &mut Session, stop_id: StopId) -> Result<Claim, TrackerError> {
    if session.completed.contains(&stop_id) {
        return Ok(Claim::Done(Completion::Duplicate {
            stop_id,
            log_id: session.logged.get(&stop_id).copied(),
        }));
    }
    let tracking = match session.tracking.as_mut() {
        Some(t) if t.trip.stop_id == stop_id => t,
        _ => return Err(TrackerError::NoActiveTripForStop { stop_id }),
    };
    if tracking.completing {
        return Ok(Claim::Done(Completion::Duplicate {
            stop_id,
            log_id: None,
        }));
    }
    tracking.completing = true;
    Ok(Claim::Ticket(CompletionTicket {
        trip: tracking.trip.clone(),
    }))
}

/// Forward watch events into the tracker until the source closes the stream.
fn spawn_pump(inner: Weak<Inner>, trip_id: TripId, watch: PositionWatch) -> JoinHandle<()> {
    let PositionWatch { id, mut events } = watch;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(inner) = inner.upgrade() else { break };
            let tracker = TripTracker { inner };
            let origin = EventOrigin::Watch { trip_id, watch: id };
            if let Some(ticket) = tracker.dispatch(origin, event).await {
                // Own task, so releasing this pump cannot cancel the write
                tokio::spawn(async move {
                    let _ = tracker.finish_completion(ticket).await;
                });
            }
        }
        debug!(watch = id.0, "position watch closed");
    })
}
