//! SubRoute Tracker - live trip tracking for courier runs
//!
//! Owns the single active trip: follows the driver's position stream,
//! accumulates distance, detects arrival at the destination and writes the
//! completed trip log exactly once. Also keeps the stop plan and a recovery
//! snapshot so a reload resumes where the driver left off.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subroute_core::{Coordinate, NewStop, TrackerConfig, UserId};
//! use subroute_tracker::simulator::{FeedPositionSource, HeadlessWakeLock};
//! use subroute_tracker::store::{MemoryRecoveryStore, MemoryTripLogStore};
//! use subroute_tracker::{Collaborators, PositionEvent, TripTracker};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let deps = Collaborators::new(
//!     Arc::new(FeedPositionSource::new()),
//!     Arc::new(HeadlessWakeLock),
//!     Arc::new(MemoryTripLogStore::new()),
//!     Arc::new(MemoryRecoveryStore::new()),
//! );
//! let tracker = TripTracker::restore(UserId::new("driver-1"), TrackerConfig::default(), deps).await;
//!
//! let stop = tracker
//!     .add_stop(NewStop::new("7 Flinders Parade").at(Coordinate::new(-27.4705, 153.0260)))
//!     .await?;
//! tracker.start_trip("Depot", None, stop).await?;
//!
//! let done = tracker
//!     .handle_position(PositionEvent::Fix(Coordinate::new(-27.4705, 153.0260)))
//!     .await?;
//! assert!(done.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod bridge;
pub mod clock;
pub mod error;
pub mod ports;
mod resources;
pub mod resumption;
pub mod simulator;
pub mod store;
pub mod tracker;

pub use bridge::PersistenceBridge;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{PersistenceError, ResourceError, TrackerError};
pub use ports::{
    Collaborators, LogOnlyLauncher, NavigationLauncher, NoPositionSource, PositionEvent,
    PositionSource, PositionWatch, RecoveryStore, TripLogStore, WakeLock, WakeLockId, WatchId,
    WatchOptions,
};
pub use resumption::{Resumption, Visibility};
pub use tracker::{
    Completion, TrackerEvent, TrackerState, TrackingStatus, TripTracker, DEFAULT_ORIGIN_LABEL,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with SubRoute Tracker
    pub use crate::{
        Collaborators, Completion, PositionEvent, TrackerError, TrackerEvent, TrackerState,
        TripTracker, Visibility,
    };
    pub use subroute_core::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
