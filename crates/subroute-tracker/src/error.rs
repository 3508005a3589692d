//! Error types for the trip tracker
//!
//! Provides error handling for:
//! - Rejected state-machine transitions
//! - Persistence collaborator failures (shown to the user verbatim)
//! - Platform resource acquisition (recovered locally, never surfaced)

use subroute_core::StopId;

/// Errors returned by `TripTracker` operations
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Manual completion for a stop that is not the active destination
    #[error("no active trip to stop {stop_id}")]
    NoActiveTripForStop { stop_id: StopId },

    /// `start_trip` while another trip is being tracked
    #[error("a trip to stop {active_stop} is already being tracked")]
    TripAlreadyActive { active_stop: StopId },

    /// Stop id not in the plan
    #[error("unknown stop {0}")]
    UnknownStop(StopId),

    /// Stop is already completed or skipped
    #[error("stop {0} is not pending")]
    StopNotPending(StopId),

    /// Trip log could not be written; the trip is still active
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl TrackerError {
    /// Check if the same call may succeed when repeated
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(e) if e.is_retryable())
    }

    /// Text to show the driver
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoActiveTripForStop { .. } => {
                "There is no active trip to this destination.".to_string()
            }
            Self::TripAlreadyActive { .. } => {
                "Finish or cancel the current trip before starting another.".to_string()
            }
            Self::UnknownStop(_) => "That stop is no longer in your plan.".to_string(),
            Self::StopNotPending(_) => "That stop has already been completed or skipped.".to_string(),
            Self::Persistence(e) => e.to_string(),
        }
    }
}

/// Persistence collaborator failures
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The backend rejected or failed the write
    #[error("{0}")]
    Backend(String),

    /// Stored data could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// User id unusable as a storage key
    #[error("invalid user id: {0}")]
    InvalidId(String),

    /// Local storage I/O failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersistenceError {
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Io(_))
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Platform resource failures (position watch, wake lock)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// Live position stream could not be started
    #[error("position watch unavailable: {0}")]
    WatchUnavailable(String),

    /// Screen wake lock refused
    #[error("wake lock unavailable: {0}")]
    WakeLockUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_message_is_verbatim() {
        let err = TrackerError::from(PersistenceError::Backend(
            "Missing or insufficient permissions.".to_string(),
        ));
        assert_eq!(err.user_message(), "Missing or insufficient permissions.");
        assert!(err.is_retryable());
    }

    #[test]
    fn rejected_transitions_are_not_retryable() {
        let err = TrackerError::NoActiveTripForStop {
            stop_id: StopId::new(),
        };
        assert!(!err.is_retryable());
        assert!(err.user_message().contains("no active trip"));
        assert!(!TrackerError::from(PersistenceError::InvalidId("../x".into())).is_retryable());
    }
}
