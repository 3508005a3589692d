//! Navigation deep links
//!
//! Turn-by-turn guidance is delegated to an external app. Only single-stop
//! links are tracked; the multi-stop link opens the whole run in Google Maps
//! and no trip is tracked or logged for it.

use crate::types::Stop;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const GOOGLE_DIR: &str = "https://www.google.com/maps/dir/?api=1";
const WAZE_UL: &str = "https://waze.com/ul";

/// External navigation app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavApp {
    Google,
    #[default]
    Waze,
}

/// Deep link that opens `app` navigating to `stop`.
///
/// Coordinates are used when the stop has them; otherwise the address text
/// is sent as a search query.
#[must_use]
pub fn deep_link(app: NavApp, stop: &Stop, avoid_tolls: bool) -> String {
    match (app, stop.location) {
        (NavApp::Google, Some(loc)) => {
            let mut url = format!(
                "{GOOGLE_DIR}&destination={},{}&travelmode=driving&dir_action=navigate",
                loc.lat, loc.lng
            );
            if avoid_tolls {
                url.push_str("&avoid=tolls");
            }
            url
        }
        (NavApp::Google, None) => {
            let mut url = format!(
                "{GOOGLE_DIR}&destination={}&travelmode=driving&dir_action=navigate",
                encode_component(&stop.address)
            );
            if avoid_tolls {
                url.push_str("&avoid=tolls");
            }
            url
        }
        (NavApp::Waze, Some(loc)) => {
            let mut url = format!("{WAZE_UL}?ll={}%2C{}&navigate=yes&zoom=17", loc.lat, loc.lng);
            if avoid_tolls {
                url.push_str("&avoid_tolls=yes");
            }
            url
        }
        (NavApp::Waze, None) => {
            let mut url = format!("{WAZE_UL}?q={}&navigate=yes", encode_component(&stop.address));
            if avoid_tolls {
                url.push_str("&avoid_tolls=yes");
            }
            url
        }
    }
}

/// Google Maps link through every pending stop, in plan order.
///
/// Returns `None` when nothing is pending.
#[must_use]
pub fn navigate_all_link(stops: &[Stop], avoid_tolls: bool) -> Option<String> {
    let targets: Vec<String> = stops
        .iter()
        .filter(|s| s.is_pending())
        .map(|s| match s.location {
            Some(loc) => format!("{},{}", loc.lat, loc.lng),
            None => encode_component(&s.address),
        })
        .collect();
    let (destination, waypoints) = targets.split_last()?;

    let mut url = format!("{GOOGLE_DIR}&destination={destination}&travelmode=driving");
    if !waypoints.is_empty() {
        let _ = write!(url, "&waypoints={}", waypoints.join("%7C"));
    }
    if avoid_tolls {
        url.push_str("&avoid=tolls");
    }
    Some(url)
}

/// Percent-encode everything outside the URI unreserved set.
fn encode_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::stops::StopStore;
    use crate::types::NewStop;

    fn stop(address: &str, location: Option<Coordinate>) -> Stop {
        let mut store = StopStore::new();
        let mut draft = NewStop::new(address);
        draft.location = location;
        let id = store.add(draft).unwrap();
        store.get(id).unwrap().clone()
    }

    #[test]
    fn google_with_coordinates() {
        let s = stop("x", Some(Coordinate::new(-27.4705, 153.026)));
        assert_eq!(
            deep_link(NavApp::Google, &s, true),
            "https://www.google.com/maps/dir/?api=1&destination=-27.4705,153.026\
             &travelmode=driving&dir_action=navigate&avoid=tolls"
        );
    }

    #[test]
    fn waze_with_coordinates() {
        let s = stop("x", Some(Coordinate::new(-27.4705, 153.026)));
        assert_eq!(
            deep_link(NavApp::Waze, &s, false),
            "https://waze.com/ul?ll=-27.4705%2C153.026&navigate=yes&zoom=17"
        );
        assert!(deep_link(NavApp::Waze, &s, true).ends_with("&avoid_tolls=yes"));
    }

    #[test]
    fn address_only_is_encoded() {
        let s = stop("7 Flinders Parade, North Lakes", None);
        assert_eq!(
            deep_link(NavApp::Waze, &s, false),
            "https://waze.com/ul?q=7%20Flinders%20Parade%2C%20North%20Lakes&navigate=yes"
        );
        assert!(deep_link(NavApp::Google, &s, false)
            .contains("destination=7%20Flinders%20Parade%2C%20North%20Lakes"));
    }

    #[test]
    fn navigate_all_uses_pending_stops_only() {
        let a = stop("A", Some(Coordinate::new(-27.1, 153.1)));
        let mut b = stop("B", Some(Coordinate::new(-27.2, 153.2)));
        let c = stop("C St", None);
        b.status = crate::types::StopStatus::Completed;

        let url = navigate_all_link(&[a, b, c], false).unwrap();
        assert!(url.contains("destination=C%20St"));
        assert!(url.contains("waypoints=-27.1,153.1"));
        assert!(!url.contains("-27.2"));
    }

    #[test]
    fn navigate_all_with_nothing_pending() {
        assert!(navigate_all_link(&[], false).is_none());
    }
}
