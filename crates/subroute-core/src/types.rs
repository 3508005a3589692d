//! Core types for SubRoute
//!
//! Defines the data the trip engine works on:
//! - Identifiers (ULID for sortability)
//! - Planned stops and their lifecycle status
//! - The in-progress `ActiveTrip`
//! - The immutable `CompletedTripLog`
//! - The recovery snapshot persisted between page loads

use crate::geo::Coordinate;
use chrono::{FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ulid_id!(
    /// Unique stop identifier
    StopId
);
ulid_id!(
    /// Identity of one tracked trip, used to tag persistence writes
    TripId
);
ulid_id!(
    /// Trip-log identifier; the idempotency key for `saveTripLog`
    LogId
);

/// Owner of a planning session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of courier stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopType {
    Pickup,
    Delivery,
    Depot,
}

/// Stop lifecycle; `Completed` and `Skipped` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopStatus {
    #[default]
    Pending,
    Completed,
    Skipped,
}

/// A planned stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: StopId,
    /// What the user typed or selected
    pub address: String,
    /// Absent for text-only stops with no GPS anchor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StopType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: StopStatus,
    /// Completion instant, milliseconds since epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl Stop {
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == StopStatus::Pending
    }
}

/// Input for adding a stop to the plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewStop {
    pub address: String,
    pub location: Option<Coordinate>,
    pub kind: Option<StopType>,
    pub notes: Option<String>,
}

impl NewStop {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn at(mut self, location: Coordinate) -> Self {
        self.location = Some(location);
        self
    }

    #[inline]
    #[must_use]
    pub fn kind(mut self, kind: StopType) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = if notes.trim().is_empty() {
            None
        } else {
            Some(notes)
        };
        self
    }
}

/// The single in-progress journey
///
/// Exists if and only if the tracker is `Tracking`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTrip {
    pub id: TripId,
    /// Stop this trip is heading to
    pub stop_id: StopId,
    pub origin: String,
    #[serde(default)]
    pub origin_location: Option<Coordinate>,
    pub destination: String,
    #[serde(default)]
    pub destination_location: Option<Coordinate>,
    /// Milliseconds since epoch
    pub start_time: i64,
    /// Accumulated kilometers, non-decreasing while tracking
    pub distance_traveled: f64,
    /// Last accepted fix, so accumulation continues after a reload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_position: Option<Coordinate>,
}

/// Immutable record of a finished trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTripLog {
    pub id: LogId,
    pub trip_id: TripId,
    pub stop_id: StopId,
    /// Completion instant, milliseconds since epoch
    pub timestamp: i64,
    /// Calendar day of completion, `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`, 24-hour
    pub start_time: String,
    pub end_time: String,
    pub origin: String,
    pub destination: String,
    /// One decimal place
    pub distance_km: f64,
    #[serde(alias = "vehicleString")]
    pub vehicle_label: String,
    pub duration_minutes: u32,
}

impl CompletedTripLog {
    /// Build the record for `trip` completed at `ended_at_ms`.
    ///
    /// A clock that stepped backwards is clamped so that the end instant is
    /// never before the start and the duration never negative.
    #[must_use]
    pub fn from_trip(
        trip: &ActiveTrip,
        ended_at_ms: i64,
        offset: FixedOffset,
        vehicle_label: impl Into<String>,
    ) -> Self {
        let ended_at_ms = ended_at_ms.max(trip.start_time);
        let elapsed_ms = ended_at_ms - trip.start_time;
        let duration_minutes = u32::try_from((elapsed_ms + 30_000) / 60_000).unwrap_or(u32::MAX);

        let started = local_time(trip.start_time, offset);
        let ended = local_time(ended_at_ms, offset);

        Self {
            id: LogId::new(),
            trip_id: trip.id,
            stop_id: trip.stop_id,
            timestamp: ended_at_ms,
            date: ended.format("%Y-%m-%d").to_string(),
            start_time: started.format("%H:%M").to_string(),
            end_time: ended.format("%H:%M").to_string(),
            origin: trip.origin.clone(),
            destination: trip.destination.clone(),
            distance_km: round_to_tenth(trip.distance_traveled.max(0.0)),
            vehicle_label: vehicle_label.into(),
            duration_minutes,
        }
    }
}

/// Serialized planning/tracking state restored after a reload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverySnapshot {
    pub stops: Vec<Stop>,
    pub active_trip: Option<ActiveTrip>,
    pub completed_stops: BTreeSet<StopId>,
}

/// Round half away from zero to one decimal place.
#[inline]
#[must_use]
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn local_time(ms: i64, offset: FixedOffset) -> chrono::DateTime<FixedOffset> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_default()
        .with_timezone(&offset)
}
