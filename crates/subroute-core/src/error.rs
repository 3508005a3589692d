//! Error types for SubRoute Core
//!
//! Covers:
//! - Configuration loading and validation
//! - Input validation at the plan/expense boundary
//! - Position source failures (delivered as events, never thrown)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value outside its allowed range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    #[inline]
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Validation errors raised before input reaches the trip state machine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Address was empty or whitespace
    #[error("address must not be empty")]
    EmptyAddress,

    /// Coordinate outside the WGS84 range or not finite
    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },

    /// Odometer reading out of range
    #[error("odometer reading {value} km is outside 0..={max} km")]
    InvalidOdometer { value: f64, max: f64 },

    /// Money or volume amount out of range
    #[error("{field} {value} is outside {min}..={max}")]
    InvalidAmount {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Failure reported by the live position source
///
/// Recovered locally: the active trip keeps tracking in degraded mode and
/// can still be completed manually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum PositionError {
    /// The user denied location access
    #[error("location permission denied")]
    PermissionDenied,

    /// No fix arrived within the configured timeout
    #[error("position request timed out")]
    Timeout,

    /// The platform could not produce a fix
    #[error("position unavailable: {0}")]
    Unavailable(String),
}

impl PositionError {
    /// Text suitable for the degraded-tracking banner
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Location access is blocked. Enable location permissions for SubRoute in your \
                 browser or device settings, or complete this stop manually."
                    .to_string()
            }
            Self::Timeout => {
                "Waiting for a GPS fix. Tracking continues; complete the stop manually if the \
                 signal does not return."
                    .to_string()
            }
            Self::Unavailable(reason) => format!(
                "GPS is unavailable ({reason}). Complete the stop manually when you arrive."
            ),
        }
    }

    /// Whether the failure needs user action rather than waiting
    #[inline]
    #[must_use]
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_message_asks_to_enable_permissions() {
        let msg = PositionError::PermissionDenied.user_message();
        assert!(msg.contains("Enable location permissions"));
        assert!(PositionError::PermissionDenied.requires_user_action());
        assert!(!PositionError::Timeout.requires_user_action());
    }

    #[test]
    fn validation_display() {
        let err = ValidationError::InvalidOdometer {
            value: -1.0,
            max: 999_999.0,
        };
        assert!(err.to_string().contains("odometer"));
    }

    #[test]
    fn position_error_serde_names() {
        let json = serde_json::to_string(&PositionError::PermissionDenied).unwrap();
        assert_eq!(json, "\"permission_denied\"");
        let back: PositionError = serde_json::from_str("{\"unavailable\":\"no satellites\"}").unwrap();
        assert_eq!(back, PositionError::Unavailable("no satellites".to_string()));
    }
}
