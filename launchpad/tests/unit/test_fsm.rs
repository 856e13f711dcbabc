//! Deployment status machine tests

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use launchpad::deploy::fsm::DeploymentStatus;
use launchpad::deploy::lifecycle::Lifecycle;
use launchpad::errors::PipelineError;
use launchpad::models::deployment::StatusUpdate;
use launchpad::store::{DeploymentStore, MemoryStore};
use launchpad_models::EventKind;

use crate::support::{record, RecordingNotifier, COMMIT};

fn lifecycle() -> (Lifecycle, Arc<MemoryStore>, Arc<RecordingNotifier>) {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    (
        Lifecycle::new(store.clone(), notifier.clone()),
        store,
        notifier,
    )
}

#[test]
fn test_status_parse_and_display() {
    for status in DeploymentStatus::ALL {
        assert_eq!(DeploymentStatus::from_str(&status.to_string()), Ok(status));
    }
    assert_eq!(DeploymentStatus::from_str(" FAILED "), Ok(DeploymentStatus::Failed));
    assert!(DeploymentStatus::from_str("running").is_err());
}

#[test]
fn test_status_serializes_lowercase() {
    let json = serde_json::to_string(&DeploymentStatus::Deploying).unwrap();
    assert_eq!(json, "\"deploying\"");
}

#[test]
fn test_cancel_allowed_from_every_active_status() {
    for from in DeploymentStatus::ALL.iter().filter(|s| !s.is_terminal()) {
        assert!(from.can_transition_to(DeploymentStatus::Cancelled), "{from}");
    }
}

#[tokio::test]
async fn test_lifecycle_happy_path_emits_one_event() {
    let (lifecycle, store, notifier) = lifecycle();
    store
        .insert(record("dep-1", COMMIT, DeploymentStatus::Pending, Utc::now()))
        .await
        .unwrap();

    for status in [
        DeploymentStatus::Building,
        DeploymentStatus::Building,
        DeploymentStatus::Deploying,
    ] {
        lifecycle
            .update_status("dep-1", StatusUpdate::new(status))
            .await
            .unwrap();
    }
    assert!(notifier.kinds().is_empty());

    let done = lifecycle
        .update_status(
            "dep-1",
            StatusUpdate::new(DeploymentStatus::Success).with_preview_url("https://dep-1.test"),
        )
        .await
        .unwrap();

    assert_eq!(done.status, DeploymentStatus::Success);
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());
    assert_eq!(notifier.kinds(), vec![EventKind::Succeeded]);
}

#[tokio::test]
async fn test_rejected_transition_leaves_record_untouched() {
    let (lifecycle, store, notifier) = lifecycle();
    store
        .insert(record("dep-1", COMMIT, DeploymentStatus::Pending, Utc::now()))
        .await
        .unwrap();

    let result = lifecycle
        .update_status(
            "dep-1",
            StatusUpdate::new(DeploymentStatus::Success).with_preview_url("https://dep-1.test"),
        )
        .await;
    assert!(matches!(result, Err(PipelineError::InvalidState(_))));

    let stored = store.get("dep-1").await.unwrap().unwrap();
    assert_eq!(stored.status, DeploymentStatus::Pending);
    assert!(stored.preview_url.is_none());
    assert!(notifier.kinds().is_empty());
}

#[tokio::test]
async fn test_fail_if_stale_skips_fresh_and_finished() {
    let (lifecycle, store, notifier) = lifecycle();
    let now = Utc::now();
    store
        .insert(record("dep-fresh", COMMIT, DeploymentStatus::Building, now))
        .await
        .unwrap();
    store
        .insert(record("dep-done", COMMIT, DeploymentStatus::Success, now))
        .await
        .unwrap();

    let cutoff = now - chrono::Duration::minutes(30);
    let fresh = lifecycle
        .fail_if_stale("dep-fresh", cutoff, "timed out".to_string())
        .await
        .unwrap();
    let done = lifecycle
        .fail_if_stale("dep-done", now + chrono::Duration::minutes(1), "timed out".to_string())
        .await
        .unwrap();

    assert!(fresh.is_none());
    assert!(done.is_none());
    assert!(notifier.kinds().is_empty());
}
