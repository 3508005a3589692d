//! Persistence bridge
//!
//! Turns a finished `ActiveTrip` into its immutable `CompletedTripLog` and
//! writes it through the trip-log store. The bridge itself holds no state;
//! exactly-once logging is enforced by the tracker, which only hands it a
//! trip after claiming the completion under its lock.

use crate::clock::Clock;
use crate::error::PersistenceError;
use crate::ports::TripLogStore;
use chrono::FixedOffset;
use std::sync::Arc;
use subroute_core::{ActiveTrip, CompletedTripLog, TrackerConfig, UserId};
use tracing::{info, warn};

/// Builds and writes trip logs
#[derive(Clone)]
pub struct PersistenceBridge {
    store: Arc<dyn TripLogStore>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    fallback_vehicle: String,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn TripLogStore>, clock: Arc<dyn Clock>, config: &TrackerConfig) -> Self {
        Self {
            store,
            clock,
            offset: config.offset(),
            fallback_vehicle: config.default_vehicle_label.clone(),
        }
    }

    /// Build the record for `trip`, ending now, and write it.
    ///
    /// # Errors
    /// Returns the store's error unchanged; nothing is retried here.
    pub async fn log_completed_trip(
        &self,
        user: &UserId,
        trip: &ActiveTrip,
        vehicle_label: &str,
    ) -> Result<CompletedTripLog, PersistenceError> {
        let log = CompletedTripLog::from_trip(trip, self.clock.now_ms(), self.offset, vehicle_label);
        self.store.save_trip_log(user, &log).await?;
        info!(
            trip_id = %trip.id,
            log_id = %log.id,
            distance_km = log.distance_km,
            duration_minutes = log.duration_minutes,
            "trip log saved"
        );
        Ok(log)
    }

    /// The user's default vehicle, or the configured fallback.
    ///
    /// A failed lookup must not block logging the trip, so it degrades to
    /// the fallback with a warning.
    pub async fn vehicle_label(&self, user: &UserId) -> String {
        match self.store.default_vehicle_label(user).await {
            Ok(Some(label)) if !label.trim().is_empty() => label,
            Ok(_) => self.fallback_vehicle.clone(),
            Err(e) => {
                warn!(error = %e, "default vehicle lookup failed, using fallback label");
                self.fallback_vehicle.clone()
            }
        }
    }

    /// Resolve the vehicle and write the log in one call
    pub async fn complete(
        &self,
        user: &UserId,
        trip: &ActiveTrip,
    ) -> Result<CompletedTripLog, PersistenceError> {
        let label = self.vehicle_label(user).await;
        self.log_completed_trip(user, trip, &label).await
    }
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("offset", &self.offset)
            .field("fallback_vehicle", &self.fallback_vehicle)
            .finish_non_exhaustive()
    }
}
