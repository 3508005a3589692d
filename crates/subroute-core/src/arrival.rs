//! Arrival detection
//!
//! Turns a stream of position fixes into two derived signals: the running
//! distance traveled, and a one-shot "arrived" when a fix lands inside the
//! geofence around the destination.
//!
//! No outlier rejection is applied. A fix far from its predecessor is
//! accepted and its full great-circle step is added to the total.

use crate::error::PositionError;
use crate::geo::{distance_km, Coordinate};

/// Jumps larger than this many arrival radii are logged
const JUMP_LOG_FACTOR: f64 = 10.0;

/// What a single fix produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixOutcome {
    /// Distance added by this fix; `None` for the first fix
    pub increment_km: Option<f64>,
    /// Running total after this fix
    pub total_km: f64,
    /// `None` when the destination has no coordinates
    pub distance_to_destination_km: Option<f64>,
    /// True exactly once per detector: on the first fix inside the radius
    pub arrived: bool,
}

/// Per-trip arrival detector
#[derive(Debug, Clone)]
pub struct ArrivalDetector {
    destination: Option<Coordinate>,
    radius_km: f64,
    previous: Option<Coordinate>,
    total_km: f64,
    arrived: bool,
    last_error: Option<PositionError>,
}

impl ArrivalDetector {
    /// Detector for a fresh trip. With no destination coordinates the
    /// detector still accumulates distance but never fires.
    #[must_use]
    pub fn new(destination: Option<Coordinate>, radius_km: f64) -> Self {
        Self {
            destination,
            radius_km,
            previous: None,
            total_km: 0.0,
            arrived: false,
            last_error: None,
        }
    }

    /// Detector continuing a recovered trip
    #[must_use]
    pub fn resume(
        destination: Option<Coordinate>,
        radius_km: f64,
        previous: Option<Coordinate>,
        total_km: f64,
    ) -> Self {
        Self {
            previous,
            total_km: total_km.max(0.0),
            ..Self::new(destination, radius_km)
        }
    }

    /// Process one fix, in delivery order.
    pub fn on_position(&mut self, current: Coordinate) -> FixOutcome {
        self.last_error = None;

        let increment_km = self.previous.map(|prev| {
            let step = distance_km(prev, current);
            if step > self.radius_km * JUMP_LOG_FACTOR {
                tracing::debug!(step_km = step, "large jump between consecutive fixes");
            }
            step
        });
        if let Some(step) = increment_km {
            self.total_km += step;
        }
        self.previous = Some(current);

        let distance_to_destination_km = self.destination.map(|dest| distance_km(current, dest));
        let inside = distance_to_destination_km.is_some_and(|d| d <= self.radius_km);
        let arrived = inside && !self.arrived;
        if arrived {
            self.arrived = true;
        }

        FixOutcome {
            increment_km,
            total_km: self.total_km,
            distance_to_destination_km,
            arrived,
        }
    }

    /// Record a position-source failure. Distance stops growing until the
    /// next successful fix.
    pub fn on_error(&mut self, error: PositionError) {
        self.last_error = Some(error);
    }

    #[inline]
    #[must_use]
    pub fn has_arrived(&self) -> bool {
        self.arrived
    }

    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.last_error.is_some()
    }

    #[inline]
    #[must_use]
    pub fn last_error(&self) -> Option<&PositionError> {
        self.last_error.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn total_km(&self) -> f64 {
        self.total_km
    }

    #[inline]
    #[must_use]
    pub fn previous(&self) -> Option<Coordinate> {
        self.previous
    }

    /// Whether this detector can ever fire
    #[inline]
    #[must_use]
    pub fn can_detect(&self) -> bool {
        self.destination.is_some()
    }
}
