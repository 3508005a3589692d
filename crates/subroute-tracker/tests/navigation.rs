//! Handing off to the external navigation app

use mockall::mock;
use std::sync::Arc;
use subroute_core::{NavApp, NewStop, StopStatus, TrackerConfig, UserId};
use subroute_test_utils::{
    destination_stop, FakePositionSource, FakeWakeLock, ManualClock, MemoryRecoveryStore,
    ScriptedTripLogStore, T0,
};
use subroute_tracker::{Collaborators, NavigationLauncher, TrackerError, TrackerState, TripTracker};

mock! {
    Launcher {}
    impl NavigationLauncher for Launcher {
        fn open(&self, url: &str);
    }
}

fn tracker_with(config: TrackerConfig, launcher: MockLauncher) -> TripTracker {
    let deps = Collaborators::new(
        Arc::new(FakePositionSource::new()),
        Arc::new(FakeWakeLock::new()),
        Arc::new(ScriptedTripLogStore::new()),
        Arc::new(MemoryRecoveryStore::new()),
    )
    .with_launcher(Arc::new(launcher))
    .with_clock(Arc::new(ManualClock::new(T0)));
    TripTracker::new(UserId::new("driver-1"), config, deps)
}

#[tokio::test]
async fn start_navigation_opens_waze_and_tracks() {
    let mut launcher = MockLauncher::new();
    launcher
        .expect_open()
        .withf(|url| url.starts_with("https://waze.com/ul?ll=") && url.contains("navigate=yes"))
        .times(1)
        .return_const(());
    let tracker = tracker_with(TrackerConfig::default(), launcher);
    let stop = tracker.add_stop(destination_stop()).await.unwrap();

    let url = tracker.start_navigation("Depot", None, stop).await.unwrap();

    assert!(url.contains("ll=-27.4705%2C153.026"));
    let TrackerState::Tracking(status) = tracker.state().await else {
        panic!("navigation must start tracking");
    };
    assert_eq!(status.trip.stop_id, stop);
    assert!(status.trip.destination_location.is_some());
    assert!(status.degraded.is_none());
}

#[tokio::test]
async fn google_link_carries_avoid_tolls() {
    let mut launcher = MockLauncher::new();
    launcher
        .expect_open()
        .withf(|url| url.starts_with("https://www.google.com/maps/dir/?api=1") && url.ends_with("&avoid=tolls"))
        .times(1)
        .return_const(());
    let config = TrackerConfig::default()
        .with_nav_app(NavApp::Google)
        .with_avoid_tolls(true);
    let tracker = tracker_with(config, launcher);
    let stop = tracker.add_stop(destination_stop()).await.unwrap();

    tracker.start_navigation("", None, stop).await.unwrap();
}

#[tokio::test]
async fn failed_start_opens_nothing() {
    let mut launcher = MockLauncher::new();
    launcher.expect_open().times(1).return_const(());
    let tracker = tracker_with(TrackerConfig::default(), launcher);
    let first = tracker.add_stop(destination_stop()).await.unwrap();
    let second = tracker.add_stop(NewStop::new("1 Queen St")).await.unwrap();
    tracker.start_navigation("", None, first).await.unwrap();

    let err = tracker.start_navigation("", None, second).await.unwrap_err();

    assert!(matches!(err, TrackerError::TripAlreadyActive { active_stop } if active_stop == first));
}

#[tokio::test]
async fn navigate_all_routes_pending_stops_without_tracking() {
    let mut launcher = MockLauncher::new();
    launcher
        .expect_open()
        .withf(|url| {
            url == "https://www.google.com/maps/dir/?api=1&destination=1%20Queen%20St\
                    &travelmode=driving&waypoints=-27.4705,153.026"
        })
        .times(1)
        .return_const(());
    let tracker = tracker_with(TrackerConfig::default(), launcher);
    let skipped = tracker.add_stop(NewStop::new("Skipped Ave")).await.unwrap();
    tracker.add_stop(destination_stop()).await.unwrap();
    tracker.add_stop(NewStop::new("1 Queen St")).await.unwrap();
    assert!(tracker.skip_stop(skipped).await);

    let url = tracker.navigate_all().await;

    assert!(url.is_some());
    assert!(tracker.state().await.is_idle());
    assert_eq!(tracker.stops().await[0].status, StopStatus::Skipped);
}

#[tokio::test]
async fn navigate_all_with_nothing_pending_opens_nothing() {
    let mut launcher = MockLauncher::new();
    launcher.expect_open().never();
    let tracker = tracker_with(TrackerConfig::default(), launcher);

    assert_eq!(tracker.navigate_all().await, None);
}
