//! Recovery tests: auto-retry, rollback, analysis and health

use chrono::{Duration, Utc};
use launchpad::deploy::fsm::DeploymentStatus;
use launchpad::deploy::service::CreateDeployment;
use launchpad::errors::PipelineError;
use launchpad::models::deployment::{DeploymentRecord, Trigger};
use launchpad::recovery::analyzer::ErrorCategory;
use launchpad::store::{DeploymentQuery, DeploymentStore};
use launchpad::workers::recovery::{tick, Options};
use launchpad_models::EventKind;

use crate::support::{react_repository, record, Harness, COMMIT};

#[tokio::test]
async fn test_network_failures_retry_until_attempt_cap() {
    let harness = Harness::new(vec![react_repository()]);
    harness.backend.fail_on(
        "npm install",
        "npm ERR! code ENOTFOUND\n\
         npm ERR! request to https://registry.npmjs.org/react failed, reason: getaddrinfo ENOTFOUND registry.npmjs.org",
    );

    let first = harness
        .state
        .deployments
        .create(CreateDeployment::new("repo-react", COMMIT, Trigger::Push))
        .await
        .unwrap();
    harness.wait_idle().await;

    let options = Options::default();
    let mut scheduled = Vec::new();
    for _ in 0..4 {
        scheduled.push(tick(&options, harness.store.as_ref(), &harness.state.recovery).await);
        harness.wait_idle().await;
    }
    assert_eq!(scheduled, vec![1, 1, 0, 0]);

    let mut attempts = harness
        .store
        .list(&DeploymentQuery::repository("repo-react"))
        .await
        .unwrap();
    attempts.sort_by_key(|r| r.attempt);
    assert_eq!(attempts.len(), 3);
    assert!(attempts
        .iter()
        .all(|r| r.status == DeploymentStatus::Failed && r.commit_hash == COMMIT));
    assert_eq!(
        attempts.iter().map(|r| r.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(attempts[1].parent_id.as_deref(), Some(first.id.as_str()));
    assert_eq!(attempts[2].parent_id.as_deref(), Some(attempts[1].id.as_str()));
    assert!(attempts[1..].iter().all(|r| r.trigger == Trigger::Retry));
    assert_eq!(attempts[1].config, first.config);

    let report = harness
        .state
        .recovery
        .analyze_failure(&attempts[2].id)
        .await
        .unwrap();
    assert_eq!(report.error_analysis.category, ErrorCategory::NetworkError);
    assert!(report.auto_retry_recommended);
    assert_eq!(report.similar_failures.len(), 2);

    let kinds = harness.notifier.kinds();
    assert_eq!(
        kinds.iter().filter(|k| **k == EventKind::RetryScheduled).count(),
        2
    );
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::Failed).count(), 3);
    assert!(harness.platform.published().is_empty());
}

async fn fail_build(harness: &Harness, command: &str, log: &str) -> String {
    harness.backend.fail_on(command, log);
    let created = harness
        .state
        .deployments
        .create(CreateDeployment::new("repo-react", COMMIT, Trigger::Push))
        .await
        .unwrap();
    harness.wait_idle().await;
    assert_eq!(
        harness.record(&created.id).await.status,
        DeploymentStatus::Failed
    );
    created.id
}

#[tokio::test]
async fn test_oom_killed_build_is_resource_limit() {
    let harness = Harness::new(vec![react_repository()]);
    let id = fail_build(
        &harness,
        "npm run build",
        "Creating an optimized production build...\nKilled",
    )
    .await;

    let report = harness.state.recovery.analyze_failure(&id).await.unwrap();
    assert_eq!(report.error_analysis.category, ErrorCategory::ResourceLimit);
    assert!(!report.auto_retry_recommended);

    let scheduled = tick(
        &Options::default(),
        harness.store.as_ref(),
        &harness.state.recovery,
    )
    .await;
    assert_eq!(scheduled, 0);
}

#[tokio::test]
async fn test_connection_timeout_in_install_is_retried() {
    let harness = Harness::new(vec![react_repository()]);
    let id = fail_build(
        &harness,
        "npm install",
        "curl: (28) Connection timed out after 30001 milliseconds",
    )
    .await;

    let report = harness.state.recovery.analyze_failure(&id).await.unwrap();
    assert_ne!(report.error_analysis.category, ErrorCategory::BuildFailure);
    assert!(report.auto_retry_recommended);

    let retry = harness.state.recovery.auto_retry(&id).await.unwrap().unwrap();
    assert_eq!(retry.trigger, Trigger::Retry);
    assert_eq!(retry.parent_id.as_deref(), Some(id.as_str()));
    harness.wait_idle().await;
}

#[tokio::test]
async fn test_registry_timeout_is_timeout_and_retried() {
    let harness = Harness::new(vec![react_repository()]);
    let id = fail_build(
        &harness,
        "npm install",
        "npm ERR! code ERR_SOCKET_TIMEOUT\nnpm ERR! deadline exceeded while fetching react",
    )
    .await;

    let report = harness.state.recovery.analyze_failure(&id).await.unwrap();
    assert_eq!(report.error_analysis.category, ErrorCategory::Timeout);
    assert!(report.auto_retry_recommended);

    let scheduled = tick(
        &Options::default(),
        harness.store.as_ref(),
        &harness.state.recovery,
    )
    .await;
    assert_eq!(scheduled, 1);
    harness.wait_idle().await;
}

fn network_failure(
    id: &str,
    attempt: u32,
    parent: Option<&str>,
    minutes_ago: i64,
) -> DeploymentRecord {
    let mut failed = record(
        id,
        COMMIT,
        DeploymentStatus::Failed,
        Utc::now() - Duration::minutes(minutes_ago),
    );
    failed.build_log = "npm ERR! connect ECONNREFUSED 104.16.0.35:443".to_string();
    failed.attempt = attempt;
    if let Some(parent) = parent {
        failed.trigger = Trigger::Retry;
        failed.parent_id = Some(parent.to_string());
    }
    failed
}

#[tokio::test]
async fn test_commit_with_three_attempts_is_not_retried() {
    let harness = Harness::new(vec![react_repository()]);
    for failed in [
        network_failure("dep-1", 1, None, 30),
        network_failure("dep-2", 2, Some("dep-1"), 20),
        network_failure("dep-3", 3, Some("dep-2"), 10),
    ] {
        harness.store.insert(failed).await.unwrap();
    }

    let report = harness.state.recovery.analyze_failure("dep-3").await.unwrap();
    assert_eq!(report.error_analysis.category, ErrorCategory::NetworkError);
    assert!(report.auto_retry_recommended);

    assert!(harness.state.recovery.auto_retry("dep-3").await.unwrap().is_none());
    assert!(harness.state.recovery.auto_retry("dep-1").await.unwrap().is_none());
    assert_eq!(
        harness.store.list(&DeploymentQuery::all()).await.unwrap().len(),
        3
    );
    assert!(!harness.notifier.kinds().contains(&EventKind::RetryScheduled));
}

#[tokio::test]
async fn test_rollbacks_do_not_spend_retry_budget() {
    let harness = Harness::new(vec![react_repository()]);
    let now = Utc::now();
    for (id, hours_ago) in [("dep-rollback-1", 3), ("dep-rollback-2", 2)] {
        let created_at = now - Duration::hours(hours_ago);
        let mut rollback = record(id, COMMIT, DeploymentStatus::Success, created_at);
        rollback.trigger = Trigger::Rollback;
        harness.store.insert(rollback).await.unwrap();
    }
    harness
        .store
        .insert(network_failure("dep-failed", 1, None, 10))
        .await
        .unwrap();

    let retry = harness.state.recovery.auto_retry("dep-failed").await.unwrap();
    assert!(retry.is_some());
    harness.wait_idle().await;
}

#[tokio::test]
async fn test_non_transient_failure_is_not_retried() {
    let harness = Harness::new(vec![react_repository()]);
    let mut failed = record("dep-bad", COMMIT, DeploymentStatus::Failed, Utc::now());
    failed.build_log = "npm ERR! Build failed".to_string();
    harness.store.insert(failed).await.unwrap();

    let retry = harness.state.recovery.auto_retry("dep-bad").await.unwrap();
    assert!(retry.is_none());

    let missing = harness.state.recovery.auto_retry("dep-missing").await;
    assert!(matches!(missing, Err(PipelineError::NotFound(_))));
}

#[tokio::test]
async fn test_rollback_picks_newest_earlier_success() {
    let harness = Harness::new(vec![react_repository()]);
    let now = Utc::now();
    harness
        .store
        .insert(record("dep-old", "aaaaaaa", DeploymentStatus::Success, now - Duration::hours(3)))
        .await
        .unwrap();
    harness
        .store
        .insert(record("dep-good", "bbbbbbb", DeploymentStatus::Success, now - Duration::hours(2)))
        .await
        .unwrap();
    harness
        .store
        .insert(record("dep-bad", COMMIT, DeploymentStatus::Failed, now - Duration::hours(1)))
        .await
        .unwrap();
    harness
        .store
        .insert(record("dep-later", "ccccccc", DeploymentStatus::Success, now))
        .await
        .unwrap();

    let rollback = harness.state.recovery.rollback("dep-bad", None).await.unwrap();
    assert_eq!(rollback.commit_hash, "bbbbbbb");
    assert_eq!(rollback.trigger, Trigger::Rollback);
    assert_eq!(rollback.parent_id.as_deref(), Some("dep-bad"));
    assert_eq!(rollback.status, DeploymentStatus::Pending);

    harness.wait_idle().await;
    assert_eq!(
        harness.record(&rollback.id).await.status,
        DeploymentStatus::Success
    );
    assert!(harness.notifier.kinds().contains(&EventKind::RollbackStarted));

    let report = harness.state.recovery.analyze_failure("dep-bad").await.unwrap();
    assert!(report.rollback_available);
    assert_eq!(
        report
            .recovery_options
            .rollback_targets
            .iter()
            .map(|r| r.id.as_str())
            .collect::<Vec<_>>(),
        vec!["dep-good", "dep-old"]
    );
}

#[tokio::test]
async fn test_rollback_to_explicit_target() {
    let harness = Harness::new(vec![react_repository()]);
    let now = Utc::now();
    harness
        .store
        .insert(record("dep-old", "aaaaaaa", DeploymentStatus::Success, now - Duration::hours(2)))
        .await
        .unwrap();
    harness
        .store
        .insert(record("dep-bad", COMMIT, DeploymentStatus::Failed, now))
        .await
        .unwrap();
    let mut foreign = record("dep-foreign", "ddddddd", DeploymentStatus::Success, now);
    foreign.repository_id = "repo-other".to_string();
    harness.store.insert(foreign).await.unwrap();

    let rollback = harness
        .state
        .recovery
        .rollback("dep-bad", Some("dep-old"))
        .await
        .unwrap();
    assert_eq!(rollback.commit_hash, "aaaaaaa");

    let foreign = harness
        .state
        .recovery
        .rollback("dep-bad", Some("dep-foreign"))
        .await;
    assert!(matches!(foreign, Err(PipelineError::InvalidState(_))));

    let failed_target = harness
        .state
        .recovery
        .rollback("dep-old", Some("dep-bad"))
        .await;
    assert!(matches!(failed_target, Err(PipelineError::InvalidState(_))));
}

#[tokio::test]
async fn test_rollback_without_history_is_invalid() {
    let harness = Harness::new(vec![react_repository()]);
    harness
        .store
        .insert(record("dep-bad", COMMIT, DeploymentStatus::Failed, Utc::now()))
        .await
        .unwrap();

    let result = harness.state.recovery.rollback("dep-bad", None).await;
    assert!(matches!(result, Err(PipelineError::InvalidState(_))));
}

#[tokio::test]
async fn test_analyze_requires_failed_record() {
    let harness = Harness::new(vec![react_repository()]);
    harness
        .store
        .insert(record("dep-ok", COMMIT, DeploymentStatus::Success, Utc::now()))
        .await
        .unwrap();

    let result = harness.state.recovery.analyze_failure("dep-ok").await;
    assert!(matches!(result, Err(PipelineError::InvalidState(_))));
}

#[tokio::test]
async fn test_health_of_idle_repository() {
    let harness = Harness::new(vec![react_repository()]);

    let health = harness
        .state
        .recovery
        .health_score("repo-react", 7)
        .await
        .unwrap();
    assert_eq!(health.score, 100);
    assert_eq!(health.total_deployments, 0);
    assert!(health.failure_trends.is_empty());
}

#[tokio::test]
async fn test_health_ignores_records_outside_window() {
    let harness = Harness::new(vec![react_repository()]);
    let now = Utc::now();
    harness
        .store
        .insert(record("dep-ancient", COMMIT, DeploymentStatus::Failed, now - Duration::days(40)))
        .await
        .unwrap();
    harness
        .store
        .insert(record("dep-ok", COMMIT, DeploymentStatus::Success, now))
        .await
        .unwrap();

    let health = harness
        .state
        .recovery
        .health_score("repo-react", 30)
        .await
        .unwrap();
    assert_eq!(health.total_deployments, 1);
    assert_eq!(health.score, 100);
}
