//! Logbook views over completed trip logs
//!
//! Two views are produced: an odometer-chained CSV suitable for a vehicle
//! logbook, and per-day summaries for the history screen.

use crate::types::{round_to_tenth, CompletedTripLog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

const CSV_HEADER: &str = "Date,Start Time,End Time,Start Odometer (km),End Odometer (km),\
                          Distance (km),Origin,Destination,Purpose,Vehicle";
const TRIP_PURPOSE: &str = "Business - Courier Delivery";

/// Totals for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    /// `YYYY-MM-DD`
    pub date: String,
    /// That day's logs, oldest first
    pub trips: Vec<CompletedTripLog>,
    pub total_distance_km: f64,
    pub total_trips: usize,
    pub first_trip_time: String,
    pub last_trip_time: String,
    pub total_duration_minutes: u32,
}

/// Render logs as logbook CSV.
///
/// Rows are ordered by completion time. Each row's start odometer is the
/// previous row's end odometer, beginning at `starting_odometer_km`.
#[must_use]
pub fn export_csv(logs: &[CompletedTripLog], starting_odometer_km: f64) -> String {
    let mut sorted: Vec<&CompletedTripLog> = logs.iter().collect();
    sorted.sort_by_key(|log| log.timestamp);

    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    let mut odometer = starting_odometer_km;
    for log in sorted {
        let start = odometer;
        let end = start + log.distance_km;
        odometer = end;

        let _ = writeln!(
            out,
            "{},{},{},{:.1},{:.1},{:.1},{},{},{},{}",
            log.date,
            log.start_time,
            log.end_time,
            start,
            end,
            log.distance_km,
            quote(&log.origin),
            quote(&log.destination),
            TRIP_PURPOSE,
            quote(&log.vehicle_label),
        );
    }
    out
}

/// Group logs by date, newest day first.
#[must_use]
pub fn daily_summaries(logs: &[CompletedTripLog]) -> Vec<DailySummary> {
    let mut by_date: BTreeMap<&str, Vec<&CompletedTripLog>> = BTreeMap::new();
    for log in logs {
        by_date.entry(log.date.as_str()).or_default().push(log);
    }

    by_date
        .into_iter()
        .rev()
        .map(|(date, mut day)| {
            day.sort_by_key(|log| log.timestamp);
            let total_distance: f64 = day.iter().map(|log| log.distance_km).sum();
            let total_duration = day
                .iter()
                .fold(0u32, |acc, log| acc.saturating_add(log.duration_minutes));
            DailySummary {
                date: date.to_string(),
                total_distance_km: round_to_tenth(total_distance),
                total_trips: day.len(),
                first_trip_time: day.first().map(|l| l.start_time.clone()).unwrap_or_default(),
                last_trip_time: day.last().map(|l| l.end_time.clone()).unwrap_or_default(),
                total_duration_minutes: total_duration,
                trips: day.into_iter().cloned().collect(),
            }
        })
        .collect()
}

/// Quote a CSV field, doubling embedded quotes
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
