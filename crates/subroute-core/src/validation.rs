//! Input validation at the plan and expense boundary

use crate::error::ValidationError;
use crate::geo::Coordinate;

/// Highest odometer reading accepted, in kilometers
pub const MAX_ODOMETER_KM: f64 = 999_999.0;
/// Largest single fuel purchase accepted, in litres
pub const MAX_FUEL_LITRES: f64 = 200.0;
/// Largest single expense accepted, in dollars
pub const MAX_COST: f64 = 1_000.0;

/// Trim an address, rejecting blank input.
pub fn validate_address(address: &str) -> Result<&str, ValidationError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyAddress)
    } else {
        Ok(trimmed)
    }
}

pub fn validate_coordinate(coord: Coordinate) -> Result<Coordinate, ValidationError> {
    if coord.is_valid() {
        Ok(coord)
    } else {
        Err(ValidationError::InvalidCoordinate {
            lat: coord.lat,
            lng: coord.lng,
        })
    }
}

pub fn validate_odometer(km: f64) -> Result<f64, ValidationError> {
    if km.is_finite() && (0.0..=MAX_ODOMETER_KM).contains(&km) {
        Ok(km)
    } else {
        Err(ValidationError::InvalidOdometer {
            value: km,
            max: MAX_ODOMETER_KM,
        })
    }
}

pub fn validate_fuel_litres(litres: f64) -> Result<f64, ValidationError> {
    in_range("fuel litres", litres, MAX_FUEL_LITRES)
}

pub fn validate_cost(amount: f64) -> Result<f64, ValidationError> {
    in_range("cost", amount, MAX_COST)
}

fn in_range(field: &'static str, value: f64, max: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::InvalidAmount {
            field,
            value,
            min: 0.0,
            max,
        })
    }
}
