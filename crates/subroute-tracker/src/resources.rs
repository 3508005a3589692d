//! Platform resources held while tracking
//!
//! The position watch and the wake lock belong to exactly one tracked trip.
//! They are attached when the trip starts, re-attached on resumption if the
//! platform dropped them, and released together when the trip ends.

use crate::ports::{Collaborators, WakeLockId, WatchId};
use tokio::task::JoinHandle;

/// Resources owned by the active trip
#[derive(Debug, Default)]
pub(crate) struct TrackingResources {
    watch: Option<ActiveWatch>,
    wake_lock: Option<WakeLockId>,
}

#[derive(Debug)]
struct ActiveWatch {
    id: WatchId,
    pump: JoinHandle<()>,
}

impl TrackingResources {
    pub(crate) fn attach_watch(&mut self, id: WatchId, pump: JoinHandle<()>) {
        debug_assert!(self.watch.is_none(), "watch attached twice");
        self.watch = Some(ActiveWatch { id, pump });
    }

    pub(crate) fn attach_wake_lock(&mut self, id: WakeLockId) {
        self.wake_lock = Some(id);
    }

    /// Id of the watch whose events are current
    pub(crate) fn watch_id(&self) -> Option<WatchId> {
        self.watch.as_ref().map(|w| w.id)
    }

    /// The watch exists and its source has not closed the stream
    pub(crate) fn watch_alive(&self) -> bool {
        self.watch.as_ref().is_some_and(|w| !w.pump.is_finished())
    }

    pub(crate) fn wake_lock_held(&self, deps: &Collaborators) -> bool {
        self.wake_lock.is_some_and(|id| deps.wake_lock.is_held(id))
    }

    /// Drop a dead watch so a fresh one can be attached
    pub(crate) fn discard_watch(&mut self, deps: &Collaborators) {
        if let Some(watch) = self.watch.take() {
            deps.positions.unwatch(watch.id);
            watch.pump.abort();
        }
    }

    /// Drop a revoked grant so a fresh one can be attached
    pub(crate) fn discard_wake_lock(&mut self, deps: &Collaborators) {
        if let Some(id) = self.wake_lock.take() {
            deps.wake_lock.release(id);
        }
    }

    /// Release everything; safe to call more than once
    pub(crate) fn release(&mut self, deps: &Collaborators) {
        if let Some(watch) = &self.watch {
            tracing::debug!(watch = watch.id.0, "releasing position watch");
        }
        self.discard_watch(deps);
        self.discard_wake_lock(deps);
    }
}
