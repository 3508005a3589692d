//! SubRoute Core - courier trip domain
//!
//! The synchronous half of the trip-tracking engine:
//! - Great-circle distance between fixes
//! - The ordered plan of pickup/delivery/depot stops
//! - Arrival detection against a geofence radius
//! - Immutable trip-log records and their logbook export
//! - Tracker configuration and input validation
//!
//! # Example
//!
//! ```rust
//! use subroute_core::{ArrivalDetector, Coordinate};
//!
//! let destination = Coordinate::new(-27.4705, 153.0260);
//! let mut detector = ArrivalDetector::new(Some(destination), 0.05);
//!
//! let far = detector.on_position(Coordinate::new(-27.4698, 153.0251));
//! assert!(!far.arrived);
//!
//! let near = detector.on_position(Coordinate::new(-27.4704, 153.0259));
//! assert!(near.arrived);
//! assert!(detector.total_km() > 0.0);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod arrival;
pub mod config;
pub mod error;
pub mod geo;
pub mod logbook;
pub mod navigation;
pub mod route;
pub mod stops;
pub mod types;
pub mod validation;

pub use arrival::{ArrivalDetector, FixOutcome};
pub use config::TrackerConfig;
pub use error::{ConfigError, PositionError, ValidationError};
pub use geo::{distance_km, Coordinate, EARTH_RADIUS_KM};
pub use logbook::{daily_summaries, export_csv, DailySummary};
pub use navigation::{deep_link, navigate_all_link, NavApp};
pub use route::nearest_neighbor_order;
pub use stops::StopStore;
pub use types::{
    ActiveTrip, CompletedTripLog, LogId, NewStop, RecoverySnapshot, Stop, StopId, StopStatus,
    StopType, TripId, UserId,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with SubRoute Core
    pub use crate::{
        ActiveTrip, ArrivalDetector, CompletedTripLog, Coordinate, NewStop, Stop, StopId,
        StopStatus, StopStore, StopType, TrackerConfig, TripId,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
