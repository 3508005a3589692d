//! Recovery snapshot round trips and resumption after reload

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use subroute_core::{Coordinate, NewStop, StopStatus};
use subroute_test_utils::{destination_stop, TestHarness, DESTINATION, ORIGIN};
use subroute_tracker::{Completion, PositionEvent, TrackerState};

#[tokio::test]
async fn reload_restores_plan_trip_and_completed_set() {
    let h = TestHarness::new();
    let done = h.tracker.add_stop(NewStop::new("Done St")).await.unwrap();
    let active = h.tracker.add_stop(destination_stop()).await.unwrap();
    let _later = h.tracker.add_stop(NewStop::new("Later Rd").notes("Back door")).await.unwrap();
    h.tracker.start_trip("", None, done).await.unwrap();
    h.tracker.manual_complete(done).await.unwrap();
    h.tracker.start_trip("Depot", Some(ORIGIN), active).await.unwrap();
    h.tracker
        .handle_position(PositionEvent::Fix(Coordinate::new(-27.4600, 153.0200)))
        .await
        .unwrap();
    h.tracker
        .handle_position(PositionEvent::Fix(Coordinate::new(-27.4650, 153.0230)))
        .await
        .unwrap();
    let before = h.tracker.snapshot().await;

    let reloaded = h.reload().await;

    assert_eq!(reloaded.snapshot().await, before);
    assert_eq!(reloaded.stops().await[0].status, StopStatus::Completed);
    assert!(reloaded.completed_stops().await.contains(&done));
    assert_eq!(h.positions.watches_started(), 3);
}

#[tokio::test]
async fn duplicate_after_reload_names_the_stored_log() {
    let h = TestHarness::new();
    let stop = h.tracker.add_stop(destination_stop()).await.unwrap();
    h.tracker.start_trip("", None, stop).await.unwrap();
    let log = h.tracker.manual_complete(stop).await.unwrap().log().cloned().unwrap();

    let reloaded = h.reload().await;

    assert_eq!(
        reloaded.manual_complete(stop).await.unwrap(),
        Completion::Duplicate {
            stop_id: stop,
            log_id: Some(log.id)
        }
    );
    assert_eq!(h.trip_logs.save_calls(), 1);
}

#[tokio::test]
async fn failed_log_lookup_on_reload_still_absorbs_duplicates() {
    let h = TestHarness::new();
    let stop = h.tracker.add_stop(destination_stop()).await.unwrap();
    h.tracker.start_trip("", None, stop).await.unwrap();
    h.tracker.manual_complete(stop).await.unwrap();
    h.trip_logs.fail_log_lookup(true);

    let reloaded = h.reload().await;

    assert_eq!(
        reloaded.manual_complete(stop).await.unwrap(),
        Completion::Duplicate {
            stop_id: stop,
            log_id: None
        }
    );
    assert_eq!(h.logs().len(), 1);
}

#[tokio::test]
async fn resumed_trip_keeps_accumulating_from_last_fix() {
    let h = TestHarness::new();
    let stop = h.tracker.add_stop(destination_stop()).await.unwrap();
    h.tracker.start_trip("", None, stop).await.unwrap();
    h.tracker
        .handle_position(PositionEvent::Fix(Coordinate::new(-27.4600, 153.0200)))
        .await
        .unwrap();
    h.tracker.handle_position(PositionEvent::Fix(ORIGIN)).await.unwrap();
    let before = h.tracker.active_trip().await.unwrap().distance_traveled;

    let reloaded = h.reload().await;
    let trip = reloaded.active_trip().await.unwrap();
    assert_eq!(trip.distance_traveled, before);
    assert_eq!(trip.last_position, Some(ORIGIN));

    let done = reloaded
        .handle_position(PositionEvent::Fix(DESTINATION))
        .await
        .unwrap()
        .expect("arrived after reload");
    let Completion::Logged(log) = done else {
        panic!("expected log");
    };
    let step = subroute_core::distance_km(ORIGIN, DESTINATION);
    assert_eq!(log.distance_km, subroute_core::types::round_to_tenth(before + step));
    assert_eq!(h.logs().len(), 1);
}

#[tokio::test]
async fn corrupt_snapshot_starts_empty() {
    let h = TestHarness::new();
    h.recovery.put_raw(&h.user, "{\"stops\": [oops");

    let reloaded = h.reload().await;

    assert!(reloaded.stops().await.is_empty());
    assert!(reloaded.state().await.is_idle());
}

#[tokio::test]
async fn recovered_trip_without_pending_destination_is_dropped() {
    let h = TestHarness::new();
    let stop = h.tracker.add_stop(destination_stop()).await.unwrap();
    h.tracker.start_trip("", None, stop).await.unwrap();
    let mut snapshot = h.tracker.snapshot().await;
    snapshot.stops.clear();
    h.recovery
        .put_raw(&h.user, serde_json::to_string(&snapshot).unwrap());

    let reloaded = h.reload().await;

    assert!(reloaded.state().await.is_idle());
    assert!(reloaded.snapshot().await.active_trip.is_none());
}

#[tokio::test]
async fn reorder_keeps_completed_stop_status_and_membership() {
    let h = TestHarness::new();
    let a = h.tracker.add_stop(NewStop::new("A")).await.unwrap();
    let b = h.tracker.add_stop(NewStop::new("B")).await.unwrap();
    let c = h.tracker.add_stop(NewStop::new("C")).await.unwrap();
    h.tracker.start_trip("", None, b).await.unwrap();
    h.tracker.manual_complete(b).await.unwrap();

    assert!(h.tracker.reorder_stops(2, 0).await);

    let order: Vec<_> = h.tracker.stops().await.iter().map(|s| s.id).collect();
    assert_eq!(order, vec![c, a, b]);
    assert_eq!(h.tracker.stops().await[2].status, StopStatus::Completed);
    assert!(h.tracker.completed_stops().await.contains(&b));
    assert_eq!(h.reload().await.snapshot().await, h.tracker.snapshot().await);
}

#[tokio::test]
async fn every_plan_edit_is_persisted() {
    let h = TestHarness::new();
    let a = h.tracker.add_stop(NewStop::new("A")).await.unwrap();
    h.tracker.add_stop(NewStop::new("B")).await.unwrap();
    let saves = h.recovery.save_count();

    h.tracker.reorder_stops(0, 1).await;
    h.tracker.skip_stop(a).await;
    h.tracker.remove_stop(a).await;
    assert_eq!(h.recovery.save_count(), saves + 3);

    assert!(!h.tracker.reorder_stops(0, 0).await);
    assert!(!h.tracker.remove_stop(a).await);
    assert_eq!(h.recovery.save_count(), saves + 3);
}

#[tokio::test]
async fn blank_address_is_rejected_before_the_plan() {
    let h = TestHarness::new();
    assert!(h.tracker.add_stop(NewStop::new("   ")).await.is_err());
    assert!(h
        .tracker
        .add_stop(NewStop::new("Nowhere").at(Coordinate::new(95.0, 0.0)))
        .await
        .is_err());
    assert!(h.tracker.stops().await.is_empty());
}

#[tokio::test]
async fn optimize_orders_pending_stops_by_distance() {
    let h = TestHarness::new();
    let far = h
        .tracker
        .add_stop(NewStop::new("Far").at(Coordinate::new(-27.30, 153.0)))
        .await
        .unwrap();
    let near = h
        .tracker
        .add_stop(NewStop::new("Near").at(Coordinate::new(-27.45, 153.0)))
        .await
        .unwrap();

    assert!(h.tracker.optimize_stops(Coordinate::new(-27.47, 153.0)).await);
    let order: Vec<_> = h.tracker.stops().await.iter().map(|s| s.id).collect();
    assert_eq!(order, vec![near, far]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_snapshot_round_trips_through_reload(
        n in 1usize..8,
        moves in proptest::collection::vec((0usize..8, 0usize..8), 0..6),
        complete_first in any::<bool>(),
        track_last in any::<bool>(),
        fixes in proptest::collection::vec((-27.6f64..-27.3, 152.8f64..153.3), 0..5),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let h = TestHarness::new();
            let mut ids = Vec::new();
            for i in 0..n {
                ids.push(h.tracker.add_stop(NewStop::new(format!("{i} Test St"))).await.unwrap());
            }
            if complete_first {
                h.tracker.start_trip("", None, ids[0]).await.unwrap();
                h.tracker.manual_complete(ids[0]).await.unwrap();
            }
            for (from, to) in moves {
                h.tracker.reorder_stops(from, to).await;
            }
            let last = ids[n - 1];
            if track_last && !(complete_first && n == 1) {
                h.tracker.start_trip("Depot", None, last).await.unwrap();
                for (lat, lng) in fixes {
                    h.tracker
                        .handle_position(PositionEvent::Fix(Coordinate::new(lat, lng)))
                        .await
                        .unwrap();
                }
            }

            let before = h.tracker.snapshot().await;
            let reloaded = h.reload().await;
            prop_assert_eq!(reloaded.snapshot().await, before.clone());
            let tracking = matches!(reloaded.state().await, TrackerState::Tracking(_));
            prop_assert_eq!(tracking, before.active_trip.is_some());
            Ok(())
        })?;
    }
}
