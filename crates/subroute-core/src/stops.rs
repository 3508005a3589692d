//! Ordered plan of courier stops
//!
//! Invalid ids and out-of-range indices are no-ops rather than errors:
//! callers pre-validate the ids they hand in. Every mutator reports whether
//! it changed anything so the owner knows when to persist the plan.

use crate::geo::Coordinate;
use crate::route::nearest_neighbor_order;
use crate::types::{NewStop, Stop, StopId, StopStatus};

/// The planning session's stops, in driving order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopStore {
    stops: Vec<Stop>,
}

impl StopStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted stops, keeping their order
    #[inline]
    #[must_use]
    pub fn from_stops(stops: Vec<Stop>) -> Self {
        Self { stops }
    }

    /// Append a stop. Blank addresses are rejected with `None`.
    pub fn add(&mut self, draft: NewStop) -> Option<StopId> {
        let address = draft.address.trim();
        if address.is_empty() {
            return None;
        }

        let id = StopId::new();
        self.stops.push(Stop {
            id,
            address: address.to_string(),
            location: draft.location,
            kind: draft.kind,
            notes: draft.notes,
            status: StopStatus::Pending,
            completed_at: None,
        });
        Some(id)
    }

    /// Remove a stop by id
    pub fn remove(&mut self, id: StopId) -> Option<Stop> {
        let idx = self.position(id)?;
        Some(self.stops.remove(idx))
    }

    /// Move the stop at `from` to `to`, preserving the relative order of the rest
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        if from == to || from >= self.stops.len() || to >= self.stops.len() {
            return false;
        }
        let moved = self.stops.remove(from);
        self.stops.insert(to, moved);
        true
    }

    /// `Pending -> Completed`
    pub fn mark_completed(&mut self, id: StopId, at_ms: i64) -> bool {
        match self.get_mut(id) {
            Some(stop) if stop.is_pending() => {
                stop.status = StopStatus::Completed;
                stop.completed_at = Some(at_ms);
                true
            }
            _ => false,
        }
    }

    /// `Pending -> Skipped`
    pub fn mark_skipped(&mut self, id: StopId) -> bool {
        match self.get_mut(id) {
            Some(stop) if stop.is_pending() => {
                stop.status = StopStatus::Skipped;
                true
            }
            _ => false,
        }
    }

    /// Reorder pending stops greedily by distance from `start`.
    ///
    /// Returns `true` if the order changed.
    pub fn optimize(&mut self, start: Coordinate) -> bool {
        let order = nearest_neighbor_order(start, &self.stops);
        let unchanged = order.iter().zip(&self.stops).all(|(id, stop)| *id == stop.id);
        if unchanged {
            return false;
        }

        let mut remaining = std::mem::take(&mut self.stops);
        for id in order {
            if let Some(idx) = remaining.iter().position(|s| s.id == id) {
                self.stops.push(remaining.swap_remove(idx));
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.stops.clear();
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: StopId) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == id)
    }

    #[inline]
    #[must_use]
    pub fn position(&self, id: StopId) -> Option<usize> {
        self.stops.iter().position(|s| s.id == id)
    }

    /// First stop still waiting to be visited
    #[must_use]
    pub fn next_pending(&self) -> Option<&Stop> {
        self.stops.iter().find(|s| s.is_pending())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stop> {
        self.stops.iter()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Stop] {
        &self.stops
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    fn get_mut(&mut self, id: StopId) -> Option<&mut Stop> {
        self.stops.iter_mut().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StopType;
    use proptest::prelude::*;

    fn store_with(addresses: &[&str]) -> (StopStore, Vec<StopId>) {
        let mut store = StopStore::new();
        let ids = addresses
            .iter()
            .map(|a| store.add(NewStop::new(*a)).unwrap())
            .collect();
        (store, ids)
    }

    fn addresses(store: &StopStore) -> Vec<&str> {
        store.iter().map(|s| s.address.as_str()).collect()
    }

    #[test]
    fn add_rejects_blank_address() {
        let mut store = StopStore::new();
        assert!(store.add(NewStop::new("   ")).is_none());
        assert!(store.add(NewStop::new("")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn add_trims_and_keeps_details() {
        let mut store = StopStore::new();
        let id = store
            .add(
                NewStop::new("  7 Flinders Parade  ")
                    .kind(StopType::Pickup)
                    .notes("Gate code 1234"),
            )
            .unwrap();
        let stop = store.get(id).unwrap();
        assert_eq!(stop.address, "7 Flinders Parade");
        assert_eq!(stop.kind, Some(StopType::Pickup));
        assert_eq!(stop.notes.as_deref(), Some("Gate code 1234"));
        assert_eq!(stop.status, StopStatus::Pending);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let (mut store, _) = store_with(&["A", "B"]);
        assert!(store.remove(StopId::new()).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn reorder_moves_one_element() {
        let (mut store, _) = store_with(&["A", "B", "C"]);
        assert!(store.reorder(2, 0));
        assert_eq!(addresses(&store), vec!["C", "A", "B"]);
        assert!(store.reorder(0, 2));
        assert_eq!(addresses(&store), vec!["A", "B", "C"]);
    }

    #[test]
    fn reorder_same_or_out_of_range_is_noop() {
        let (mut store, _) = store_with(&["A", "B"]);
        assert!(!store.reorder(1, 1));
        assert!(!store.reorder(0, 5));
        assert!(!store.reorder(7, 0));
        assert_eq!(addresses(&store), vec!["A", "B"]);
    }

    #[test]
    fn status_transitions_only_from_pending() {
        let (mut store, ids) = store_with(&["A", "B"]);
        assert!(store.mark_completed(ids[0], 1_000));
        assert!(!store.mark_completed(ids[0], 2_000));
        assert!(!store.mark_skipped(ids[0]));
        assert_eq!(store.get(ids[0]).unwrap().completed_at, Some(1_000));

        assert!(store.mark_skipped(ids[1]));
        assert!(!store.mark_completed(ids[1], 3_000));
        assert_eq!(store.get(ids[1]).unwrap().status, StopStatus::Skipped);
        assert!(store.next_pending().is_none());
    }

    #[test]
    fn reorder_keeps_completed_status() {
        let (mut store, ids) = store_with(&["A", "B", "C"]);
        store.mark_completed(ids[1], 10);
        store.reorder(2, 0);
        assert_eq!(addresses(&store), vec!["C", "A", "B"]);
        assert_eq!(store.get(ids[1]).unwrap().status, StopStatus::Completed);
    }

    proptest! {
        #[test]
        fn prop_reorder_is_a_permutation(n in 1usize..12, from in 0usize..12, to in 0usize..12) {
            let names: Vec<String> = (0..n).map(|i| format!("Stop {i}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let (mut store, ids) = store_with(&refs);
            store.reorder(from, to);

            let mut after: Vec<StopId> = store.iter().map(|s| s.id).collect();
            prop_assert_eq!(after.len(), ids.len());
            if from < n && to < n {
                prop_assert_eq!(after[to], ids[from]);
            }
            after.sort();
            let mut before = ids.clone();
            before.sort();
            prop_assert_eq!(after, before);
        }
    }
}
