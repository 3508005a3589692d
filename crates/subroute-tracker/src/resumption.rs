//! Session resumption on page visibility changes
//!
//! While the driver is in an external navigation app the page is hidden,
//! and the platform may stop the position watch or revoke the wake lock.
//! When the page becomes visible again and a trip is still being tracked,
//! whichever of the two is gone is acquired again. Nothing happens when
//! idle, and resources that are still alive are left as they are.

use crate::tracker::{TrackerEvent, TripTracker};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Page visibility as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// What a visibility change re-acquired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resumption {
    pub watch_reacquired: bool,
    pub wake_lock_reacquired: bool,
}

impl Resumption {
    #[inline]
    #[must_use]
    pub fn any(&self) -> bool {
        self.watch_reacquired || self.wake_lock_reacquired
    }
}

impl TripTracker {
    /// React to the page becoming visible or hidden.
    pub async fn on_visibility_change(&self, visibility: Visibility) -> Resumption {
        if visibility == Visibility::Hidden {
            debug!("page hidden, keeping tracking resources");
            return Resumption::default();
        }

        let mut session = self.inner.session.lock().await;
        let Some(tracking) = session.tracking.as_mut() else {
            return Resumption::default();
        };
        let deps = &self.inner.deps;

        let mut resumed = Resumption::default();
        if !tracking.resources.watch_alive() {
            tracking.resources.discard_watch(deps);
            resumed.watch_reacquired = self.acquire_watch(tracking);
        }
        if !tracking.resources.wake_lock_held(deps) {
            tracking.resources.discard_wake_lock(deps);
            resumed.wake_lock_reacquired = self.acquire_wake_lock(tracking);
        }

        if resumed.any() {
            info!(
                trip_id = %tracking.trip.id,
                watch = resumed.watch_reacquired,
                wake_lock = resumed.wake_lock_reacquired,
                "tracking resumed"
            );
            self.emit(TrackerEvent::ResourcesReacquired {
                trip_id: tracking.trip.id,
                watch: resumed.watch_reacquired,
                wake_lock: resumed.wake_lock_reacquired,
            });
        }
        resumed
    }
}
