//! Tracker configuration
//!
//! All fields have defaults, so an empty TOML document is a valid config.
//!
//! ```toml
//! arrival_radius_km = 0.05
//! high_accuracy = true
//! timeout_ms = 10000
//! nav_app = "google"
//! ```

use crate::error::ConfigError;
use crate::navigation::NavApp;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest UTC offset any real zone uses, in minutes
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Configuration for trip tracking and log generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Geofence radius around the destination
    pub arrival_radius_km: f64,
    /// Ask the position source for GPS-grade fixes
    pub high_accuracy: bool,
    /// Hint for how often fixes should arrive
    pub update_interval_ms: u64,
    /// Bound on each fix request
    pub timeout_ms: u64,
    /// Oldest cached fix accepted
    pub max_age_ms: u64,
    /// Offset used for log dates and HH:MM times
    pub utc_offset_minutes: i32,
    /// Used when the user has no default vehicle
    pub default_vehicle_label: String,
    pub nav_app: NavApp,
    pub avoid_tolls: bool,
    /// First odometer reading for logbook export
    pub starting_odometer_km: f64,
}

impl TrackerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.arrival_radius_km.is_finite() || self.arrival_radius_km <= 0.0 {
            return Err(ConfigError::invalid(
                "arrival_radius_km",
                format!("must be a positive number, got {}", self.arrival_radius_km),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("timeout_ms", "must be greater than zero"));
        }
        if self.update_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "update_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(ConfigError::invalid(
                "utc_offset_minutes",
                format!("{} is beyond ±14h", self.utc_offset_minutes),
            ));
        }
        if !self.starting_odometer_km.is_finite() || self.starting_odometer_km < 0.0 {
            return Err(ConfigError::invalid(
                "starting_odometer_km",
                "must be a non-negative number",
            ));
        }
        Ok(())
    }

    /// Offset for rendering log times
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// With arrival radius
    #[inline]
    #[must_use]
    pub fn with_arrival_radius_km(mut self, radius_km: f64) -> Self {
        self.arrival_radius_km = radius_km;
        self
    }

    /// With UTC offset in minutes
    #[inline]
    #[must_use]
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// With fallback vehicle label
    #[inline]
    #[must_use]
    pub fn with_default_vehicle_label(mut self, label: impl Into<String>) -> Self {
        self.default_vehicle_label = label.into();
        self
    }

    /// With navigation app
    #[inline]
    #[must_use]
    pub fn with_nav_app(mut self, app: NavApp) -> Self {
        self.nav_app = app;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_avoid_tolls(mut self, avoid: bool) -> Self {
        self.avoid_tolls = avoid;
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            arrival_radius_km: 0.05,
            high_accuracy: true,
            update_interval_ms: 5_000,
            timeout_ms: 10_000,
            max_age_ms: 5_000,
            utc_offset_minutes: 600,
            default_vehicle_label: "Default".to_string(),
            nav_app: NavApp::Waze,
            avoid_tolls: false,
            starting_odometer_km: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_geofence_settings() {
        let config = TrackerConfig::default();
        assert_eq!(config.arrival_radius_km, 0.05);
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.max_age_ms, 5_000);
        assert!(config.high_accuracy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_default() {
        let config = TrackerConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = TrackerConfig::from_toml_str(
            "arrival_radius_km = 0.1\nnav_app = \"google\"\nutc_offset_minutes = 570\n",
        )
        .unwrap();
        assert_eq!(config.arrival_radius_km, 0.1);
        assert_eq!(config.nav_app, NavApp::Google);
        assert_eq!(config.offset().local_minus_utc(), 570 * 60);
        assert_eq!(config.timeout_ms, 10_000);
    }

    #[test]
    fn rejects_non_positive_radius() {
        let err = TrackerConfig::from_toml_str("arrival_radius_km = 0.0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "arrival_radius_km",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_nav_app() {
        assert!(matches!(
            TrackerConfig::from_toml_str("nav_app = \"apple\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_offset_out_of_range() {
        let config = TrackerConfig::new().with_utc_offset_minutes(15 * 60);
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_vehicle_label = \"Hilux ABC123\"").unwrap();
        let config = TrackerConfig::load(file.path()).unwrap();
        assert_eq!(config.default_vehicle_label, "Hilux ABC123");
    }

    #[test]
    fn load_missing_file() {
        let err = TrackerConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
