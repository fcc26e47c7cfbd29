//! Refreshing the tracker from a live directory.

use tether_presence::{
    Destination, DestinationDirectory, PresenceError, PresenceTracker, StaticDirectory,
};

/// A directory service that is down.
struct Offline;

impl DestinationDirectory for Offline {
    async fn destinations(&self) -> Result<Vec<Destination>, PresenceError> {
        Err(PresenceError::Directory("connection refused".into()))
    }
}

fn fallback() -> StaticDirectory {
    StaticDirectory::from_json(
        r#"[
            {"api_name": "arena_eu", "display_name": "Arena (Europe)", "region": "eu"}
        ]"#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_refresh_failure_keeps_fallback_table() {
    let mut tracker = PresenceTracker::new(&fallback());

    let refreshed = tracker.refresh(&Offline).await;

    assert!(!refreshed);
    assert_eq!(tracker.display_name("arena_eu"), Some("Arena (Europe)"));
}

#[tokio::test]
async fn test_refresh_success_replaces_table() {
    let mut tracker = PresenceTracker::new(&fallback());
    let live = StaticDirectory::new(vec![
        Destination::new("arena_us", "Arena (US)", "us"),
        Destination::new("arena_ap", "Arena (Asia)", "ap"),
    ]);

    let refreshed = tracker.refresh(&live).await;

    assert!(refreshed);
    assert_eq!(tracker.destination_for_region("ap"), Some("arena_ap"));
    assert_eq!(tracker.display_name("arena_eu"), None);
}

#[tokio::test]
async fn test_refresh_empty_answer_keeps_table() {
    let mut tracker = PresenceTracker::new(&fallback());

    let refreshed = tracker.refresh(&StaticDirectory::default()).await;

    assert!(!refreshed);
    assert_eq!(tracker.region("arena_eu"), Some("eu"));
}
