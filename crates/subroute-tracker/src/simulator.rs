//! Trip replay simulator
//!
//! Drives a `TripTracker` through a recorded or synthetic sequence of
//! position events using in-memory collaborators and a manual clock, and
//! reports what the tracker did with them.
//!
//! Replays are JSON:
//!
//! ```json
//! {
//!   "originLabel": "Depot",
//!   "destination": { "address": "7 Flinders Parade", "location": { "lat": -27.4705, "lng": 153.026 } },
//!   "stepMs": 30000,
//!   "events": [
//!     { "fix": { "lat": -27.4698, "lng": 153.0251 } },
//!     { "error": "timeout" },
//!     { "fix": { "lat": -27.4705, "lng": 153.026 } }
//!   ]
//! }
//! ```

use crate::clock::{Clock, ManualClock, SystemClock};
use crate::error::{ResourceError, TrackerError};
use crate::ports::{
    Collaborators, PositionEvent, PositionSource, PositionWatch, WakeLock, WakeLockId, WatchId,
    WatchOptions,
};
use crate::store::{MemoryRecoveryStore, MemoryTripLogStore};
use crate::tracker::{Completion, TrackerEvent, TripTracker};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use subroute_core::{
    CompletedTripLog, Coordinate, NewStop, PositionError, TrackerConfig, UserId, ValidationError,
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::mpsc;
use tracing::{info, warn};

const REPLAY_USER: &str = "replay";

/// Destination of a replayed trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayStop {
    pub address: String,
    #[serde(default)]
    pub location: Option<Coordinate>,
}

/// One replayed delivery from the position source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayEvent {
    Fix(Coordinate),
    Error(PositionError),
}

impl From<ReplayEvent> for PositionEvent {
    fn from(event: ReplayEvent) -> Self {
        match event {
            ReplayEvent::Fix(c) => Self::Fix(c),
            ReplayEvent::Error(e) => Self::Error(e),
        }
    }
}

/// A trip to replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripReplay {
    #[serde(default)]
    pub origin_label: String,
    #[serde(default)]
    pub origin_location: Option<Coordinate>,
    pub destination: ReplayStop,
    pub events: Vec<ReplayEvent>,
    /// Simulated time between events
    #[serde(default = "default_step_ms")]
    pub step_ms: i64,
    /// Trip start, milliseconds since epoch; defaults to now
    #[serde(default)]
    pub start_time_ms: Option<i64>,
    #[serde(default)]
    pub vehicle_label: Option<String>,
    /// Complete by hand if the events never trigger arrival
    #[serde(default)]
    pub complete_manually: bool,
}

fn default_step_ms() -> i64 {
    30_000
}

impl TripReplay {
    /// Replay of a drive in a straight line from `origin` to `destination`
    #[must_use]
    pub fn straight_line(origin: Coordinate, destination: Coordinate, steps: usize) -> Self {
        Self {
            origin_label: String::new(),
            origin_location: Some(origin),
            destination: ReplayStop {
                address: format!("{}, {}", destination.lat, destination.lng),
                location: Some(destination),
            },
            events: straight_line(origin, destination, steps)
                .into_iter()
                .map(ReplayEvent::Fix)
                .collect(),
            step_ms: default_step_ms(),
            start_time_ms: None,
            vehicle_label: None,
            complete_manually: false,
        }
    }
}

/// `steps + 1` evenly spaced fixes from `origin` to `destination` inclusive
#[must_use]
pub fn straight_line(origin: Coordinate, destination: Coordinate, steps: usize) -> Vec<Coordinate> {
    let steps = steps.max(1);
    (0..=steps)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f64 / steps as f64;
            origin.lerp(&destination, t)
        })
        .collect()
}

/// Outcome of a replay
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    /// Index of the event that triggered arrival
    pub arrived_at_event: Option<usize>,
    pub log: Option<CompletedTripLog>,
    /// Running distance after each accepted fix
    pub distance_km: Vec<f64>,
    pub position_errors: usize,
    /// Everything the tracker emitted, in order
    pub events: Vec<TrackerEvent>,
    /// Events the tracker emitted faster than the replay collected them
    pub events_dropped: u64,
}

impl ReplayReport {
    /// Collect whatever the tracker has emitted since the last call
    fn collect(&mut self, rx: &mut broadcast::Receiver<TrackerEvent>) {
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    if let TrackerEvent::DistanceUpdated { distance_km, .. } = event {
                        if self.distance_km.last() != Some(&distance_km) {
                            self.distance_km.push(distance_km);
                        }
                    }
                    self.events.push(event);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "replay fell behind tracker events");
                    self.events_dropped += skipped;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}

/// Errors that stop a replay before it runs
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("invalid destination: {0}")]
    Destination(#[from] ValidationError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Run `replay` through a fresh tracker
pub async fn run_replay(config: TrackerConfig, replay: TripReplay) -> Result<ReplayReport, ReplayError> {
    let user = UserId::new(REPLAY_USER);
    let clock = Arc::new(ManualClock::new(
        replay.start_time_ms.unwrap_or_else(|| SystemClock.now_ms()),
    ));
    let trip_logs = Arc::new(MemoryTripLogStore::new());
    if let Some(label) = &replay.vehicle_label {
        trip_logs.set_vehicle_label(&user, label.clone());
    }
    let deps = Collaborators::new(
        Arc::new(FeedPositionSource::new()),
        Arc::new(HeadlessWakeLock),
        trip_logs.clone(),
        Arc::new(MemoryRecoveryStore::new()),
    )
    .with_clock(clock.clone());

    let tracker = TripTracker::new(user, config, deps);
    let mut events = tracker.subscribe();

    let mut draft = NewStop::new(replay.destination.address);
    draft.location = replay.destination.location;
    let stop_id = tracker.add_stop(draft).await?;
    tracker
        .start_trip(&replay.origin_label, replay.origin_location, stop_id)
        .await?;

    let mut report = ReplayReport {
        arrived_at_event: None,
        log: None,
        distance_km: Vec::new(),
        position_errors: 0,
        events: Vec::new(),
        events_dropped: 0,
    };
    report.collect(&mut events);
    for (idx, event) in replay.events.into_iter().enumerate() {
        clock.advance_ms(replay.step_ms);
        if matches!(event, ReplayEvent::Error(_)) {
            report.position_errors += 1;
        }
        let completion = tracker.handle_position(event.into()).await?;
        report.collect(&mut events);
        if let Some(completion) = completion {
            report.arrived_at_event.get_or_insert(idx);
            if let Completion::Logged(log) = completion {
                report.log = Some(log);
            }
        }
    }

    if report.log.is_none() && replay.complete_manually {
        if let Completion::Logged(log) = tracker.manual_complete(stop_id).await? {
            report.log = Some(log);
        }
        report.collect(&mut events);
    }

    info!(
        arrived_at_event = ?report.arrived_at_event,
        logged = report.log.is_some(),
        "replay finished"
    );
    Ok(report)
}

/// Position source fed by hand
///
/// Every pushed event goes to all open watches, in push order.
#[derive(Debug, Default)]
pub struct FeedPositionSource {
    next_id: AtomicU64,
    senders: Mutex<HashMap<WatchId, mpsc::UnboundedSender<PositionEvent>>>,
    started: AtomicU64,
}

impl FeedPositionSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every open watch; returns how many received it
    pub fn push(&self, event: PositionEvent) -> usize {
        let mut senders = self.senders.lock();
        senders.retain(|_, tx| !tx.is_closed());
        senders
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    pub fn push_fix(&self, lat: f64, lng: f64) -> usize {
        self.push(PositionEvent::Fix(Coordinate::new(lat, lng)))
    }

    /// Close every open watch, as a platform does when it suspends a page
    pub fn close_all(&self) {
        self.senders.lock().clear();
    }

    /// Number of watches currently open
    pub fn open_watches(&self) -> usize {
        self.senders.lock().len()
    }

    /// Number of watches ever started
    pub fn watches_started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }
}

impl PositionSource for FeedPositionSource {
    fn watch(&self, _options: WatchOptions) -> Result<PositionWatch, ResourceError> {
        let id = WatchId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, events) = mpsc::unbounded_channel();
        self.senders.lock().insert(id, tx);
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(PositionWatch { id, events })
    }

    fn unwatch(&self, id: WatchId) {
        self.senders.lock().remove(&id);
    }
}

/// Wake lock for hosts without a screen; always granted, never revoked
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessWakeLock;

impl WakeLock for HeadlessWakeLock {
    fn acquire(&self) -> Result<WakeLockId, ResourceError> {
        Ok(WakeLockId(0))
    }

    fn release(&self, _id: WakeLockId) {}

    fn is_held(&self, _id: WakeLockId) -> bool {
        true
    }
}
