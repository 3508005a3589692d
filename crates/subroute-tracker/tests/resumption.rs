//! Re-acquiring the position watch and wake lock when the page is visible again

use subroute_test_utils::{destination_stop, settle, wait_for_event, TestHarness, DESTINATION};
use subroute_tracker::{Resumption, TrackerEvent, TrackerState, Visibility};

#[tokio::test]
async fn idle_visibility_change_does_nothing() {
    let h = TestHarness::new();
    let resumed = h.tracker.on_visibility_change(Visibility::Visible).await;
    assert_eq!(resumed, Resumption::default());
    assert_eq!(h.positions.watches_started(), 0);
    assert_eq!(h.wake_lock.acquisitions(), 0);
}

#[tokio::test]
async fn live_resources_are_not_acquired_twice() {
    let h = TestHarness::new();
    let stop = h.tracker.add_stop(destination_stop()).await.unwrap();
    h.tracker.start_trip("", None, stop).await.unwrap();

    assert!(!h.tracker.on_visibility_change(Visibility::Hidden).await.any());
    assert!(!h.tracker.on_visibility_change(Visibility::Visible).await.any());

    assert_eq!(h.positions.watches_started(), 1);
    assert_eq!(h.positions.open_watches(), 1);
    assert_eq!(h.wake_lock.acquisitions(), 1);
}

#[tokio::test]
async fn revoked_resources_come_back_on_visible() {
    let h = TestHarness::new();
    let mut events = h.tracker.subscribe();
    let stop = h.tracker.add_stop(destination_stop()).await.unwrap();
    h.tracker.start_trip("", None, stop).await.unwrap();

    h.tracker.on_visibility_change(Visibility::Hidden).await;
    h.positions.close_all();
    h.wake_lock.revoke_all();
    settle().await;

    let resumed = h.tracker.on_visibility_change(Visibility::Visible).await;

    assert_eq!(
        resumed,
        Resumption {
            watch_reacquired: true,
            wake_lock_reacquired: true
        }
    );
    assert_eq!(h.positions.open_watches(), 1);
    assert_eq!(h.positions.watches_started(), 2);
    assert_eq!(h.wake_lock.held_count(), 1);
    assert!(
        wait_for_event(&mut events, |e| matches!(e, TrackerEvent::ResourcesReacquired { .. }))
            .await
            .is_some()
    );

    // The fresh watch drives arrival
    h.positions.push_fix(DESTINATION);
    assert!(
        wait_for_event(&mut events, |e| matches!(e, TrackerEvent::TripLogged { .. }))
            .await
            .is_some()
    );
}

#[tokio::test]
async fn only_the_missing_resource_is_reacquired() {
    let h = TestHarness::new();
    let stop = h.tracker.add_stop(destination_stop()).await.unwrap();
    h.tracker.start_trip("", None, stop).await.unwrap();

    h.wake_lock.revoke_all();
    let resumed = h.tracker.on_visibility_change(Visibility::Visible).await;

    assert!(!resumed.watch_reacquired);
    assert!(resumed.wake_lock_reacquired);
    assert_eq!(h.positions.watches_started(), 1);
}

#[tokio::test]
async fn watch_failing_at_start_is_retried_on_visible() {
    let h = TestHarness::new();
    h.positions.fail_next_watch("permission prompt dismissed");
    let stop = h.tracker.add_stop(destination_stop()).await.unwrap();
    h.tracker.start_trip("", None, stop).await.unwrap();
    assert_eq!(h.positions.open_watches(), 0);

    let resumed = h.tracker.on_visibility_change(Visibility::Visible).await;

    assert!(resumed.watch_reacquired);
    assert_eq!(h.positions.open_watches(), 1);
}

#[tokio::test]
async fn events_from_a_replaced_watch_are_ignored() {
    let h = TestHarness::new();
    let stop = h.tracker.add_stop(destination_stop()).await.unwrap();
    h.tracker.start_trip("", None, stop).await.unwrap();
    h.tracker.abandon().await;
    settle().await;

    assert_eq!(h.positions.push_fix(DESTINATION), 0);
    settle().await;
    assert!(matches!(h.tracker.state().await, TrackerState::Idle));
    assert!(h.logs().is_empty());
}
