//! Nearest-neighbor stop ordering.
//!
//! Greedy: from the driver's position, always drive to the closest pending
//! stop next. O(n²) in the number of stops, which is fine for a courier run.
//!
//! Completed and skipped stops stay at the front in their original order.
//! Pending stops without coordinates cannot be placed and go last, also in
//! their original order.

use crate::geo::{distance_km, Coordinate};
use crate::types::{Stop, StopId};

/// Compute a driving order for `stops` starting at `start`.
///
/// # Examples
///
/// ```
/// use subroute_core::{nearest_neighbor_order, Coordinate, NewStop, StopStore};
///
/// let mut store = StopStore::new();
/// let far = store.add(NewStop::new("Far").at(Coordinate::new(-27.0, 153.0))).unwrap();
/// let near = store.add(NewStop::new("Near").at(Coordinate::new(-27.40, 153.0))).unwrap();
///
/// let order = nearest_neighbor_order(Coordinate::new(-27.47, 153.0), store.as_slice());
/// assert_eq!(order, vec![near, far]);
/// ```
#[must_use]
pub fn nearest_neighbor_order(start: Coordinate, stops: &[Stop]) -> Vec<StopId> {
    let mut order: Vec<StopId> = stops
        .iter()
        .filter(|s| !s.is_pending())
        .map(|s| s.id)
        .collect();

    let mut candidates: Vec<(StopId, Coordinate)> = stops
        .iter()
        .filter(|s| s.is_pending())
        .filter_map(|s| s.location.map(|loc| (s.id, loc)))
        .collect();

    let mut current = start;
    while !candidates.is_empty() {
        let nearest = candidates
            .iter()
            .enumerate()
            .min_by(|(_, (_, a)), (_, (_, b))| {
                distance_km(current, *a).total_cmp(&distance_km(current, *b))
            })
            .map(|(idx, _)| idx);
        let Some(idx) = nearest else { break };
        let (id, loc) = candidates.remove(idx);
        order.push(id);
        current = loc;
    }

    order.extend(
        stops
            .iter()
            .filter(|s| s.is_pending() && s.location.is_none())
            .map(|s| s.id),
    );
    order
}
