//! End-to-end deployment pipeline tests

use std::sync::Arc;

use chrono::{Duration, Utc};
use launchpad::deploy::fsm::DeploymentStatus;
use launchpad::deploy::service::CreateDeployment;
use launchpad::errors::PipelineError;
use launchpad::models::deployment::{ConfigOverrides, StatusUpdate, Trigger};
use launchpad::models::project::ProjectType;
use launchpad::recovery::analyzer::ErrorCategory;
use launchpad::storage::layout::StorageLayout;
use launchpad::store::{DeploymentQuery, DeploymentStore, MemoryStore};
use launchpad_models::EventKind;

use crate::support::{react_repository, record, Harness, COMMIT};

#[tokio::test]
async fn test_unknown_repository_is_not_found() {
    let harness = Harness::new(vec![react_repository()]);

    let result = harness
        .state
        .deployments
        .create(CreateDeployment::new("repo-missing", COMMIT, Trigger::Manual))
        .await;

    assert!(matches!(result, Err(PipelineError::NotFound(_))));
    assert!(harness
        .store
        .list(&DeploymentQuery::all())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_invalid_commit_is_rejected() {
    let harness = Harness::new(vec![react_repository()]);

    let result = harness
        .state
        .deployments
        .create(CreateDeployment::new("repo-react", "HEAD~1", Trigger::Manual))
        .await;

    assert!(matches!(result, Err(PipelineError::ValidationFailure(_))));
}

#[tokio::test]
async fn test_react_deployment_succeeds() {
    let harness = Harness::new(vec![react_repository()]);

    let created = harness
        .state
        .deployments
        .create(CreateDeployment::new("repo-react", COMMIT, Trigger::Push))
        .await
        .unwrap();
    assert_eq!(created.status, DeploymentStatus::Pending);
    assert_eq!(created.project_type, ProjectType::React);
    assert_eq!(created.branch, "main");
    assert_eq!(created.config.build_command.as_deref(), Some("npm run build"));
    assert_eq!(created.config.output_directory, "build");
    assert_eq!(created.attempt, 1);

    harness.wait_idle().await;
    let done = harness.record(&created.id).await;

    assert_eq!(done.status, DeploymentStatus::Success);
    assert_eq!(
        done.preview_url,
        Some(format!("https://{}.preview.test", created.id))
    );
    assert!(done.error_message.is_none());
    assert!(done.build_log.contains("$ npm install"));
    assert!(done.build_log.contains("$ npm run build"));
    assert!(done.deploy_log.contains("published"));

    let started = done.started_at.unwrap();
    let completed = done.completed_at.unwrap();
    assert!(completed >= started);
    assert!(done.duration_secs.unwrap() >= 0);

    assert_eq!(harness.backend.commands(), vec!["npm install", "npm run build"]);
    assert_eq!(harness.notifier.kinds(), vec![EventKind::Succeeded]);
    assert!(!harness.layout.workspace_dir(&created.id).exists().await);
}

#[tokio::test]
async fn test_call_site_overrides_win() {
    let harness = Harness::new(vec![react_repository()]);

    let overrides = ConfigOverrides {
        project_type: Some(ProjectType::Static),
        output_directory: Some(".".to_string()),
        ..Default::default()
    };
    let created = harness
        .state
        .deployments
        .create(
            CreateDeployment::new("repo-react", COMMIT, Trigger::Manual)
                .with_branch("release/1.2")
                .with_overrides(overrides),
        )
        .await
        .unwrap();
    assert_eq!(created.project_type, ProjectType::Static);
    assert_eq!(created.branch, "release/1.2");
    assert!(created.config.build_command.is_none());

    harness.wait_idle().await;
    let done = harness.record(&created.id).await;
    assert_eq!(done.status, DeploymentStatus::Success);
    assert!(done.build_log.contains("No build step for static project"));
    assert!(harness.backend.commands().is_empty());
}

#[tokio::test]
async fn test_build_failure_is_recorded_and_classified() {
    let harness = Harness::new(vec![react_repository()]);
    harness.backend.fail_on("npm run build", "npm ERR! Build failed");

    let created = harness
        .state
        .deployments
        .create(CreateDeployment::new("repo-react", COMMIT, Trigger::Push))
        .await
        .unwrap();
    harness.wait_idle().await;

    let done = harness.record(&created.id).await;
    assert_eq!(done.status, DeploymentStatus::Failed);
    assert!(!done.error_message.as_deref().unwrap_or_default().is_empty());
    assert!(done.build_log.contains("npm ERR! Build failed"));
    assert!(done.preview_url.is_none());
    assert!(harness.platform.published().is_empty());
    assert_eq!(harness.notifier.kinds(), vec![EventKind::Failed]);

    let report = harness
        .state
        .recovery
        .analyze_failure(&created.id)
        .await
        .unwrap();
    assert_eq!(report.error_analysis.category, ErrorCategory::BuildFailure);
    assert!(!report.auto_retry_recommended);
    assert!(!report.rollback_available);
    assert!(report
        .recovery_plan
        .last()
        .unwrap()
        .starts_with("Consider rolling back"));
}

#[tokio::test]
async fn test_publish_failure_fails_deploying_record() {
    let harness = Harness::new(vec![react_repository()]);
    harness.platform.fail_with("503 Service Unavailable");

    let created = harness
        .state
        .deployments
        .create(CreateDeployment::new("repo-react", COMMIT, Trigger::Webhook))
        .await
        .unwrap();
    harness.wait_idle().await;

    let done = harness.record(&created.id).await;
    assert_eq!(done.status, DeploymentStatus::Failed);
    assert!(done
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("publish failed"));
    assert!(done.deploy_log.contains("Publishing with fake"));
}

#[tokio::test]
async fn test_missing_repository_at_execution_fails_record() {
    let harness = Harness::new(vec![]);
    let mut pending = record("dep-orphan", COMMIT, DeploymentStatus::Pending, Utc::now());
    pending.repository_id = "repo-gone".to_string();
    harness.store.insert(pending).await.unwrap();

    harness.state.deployments.dispatcher().submit("dep-orphan");
    harness.wait_idle().await;

    let done = harness.record("dep-orphan").await;
    assert_eq!(done.status, DeploymentStatus::Failed);
    assert!(done
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("repo-gone"));
}

#[tokio::test]
async fn test_push_respects_disabled_auto_deploy() {
    let mut repository = react_repository();
    repository.settings.auto_deploy = false;
    let harness = Harness::new(vec![repository]);

    let push = harness
        .state
        .deployments
        .create(CreateDeployment::new("repo-react", COMMIT, Trigger::Push))
        .await;
    assert!(matches!(push, Err(PipelineError::InvalidState(_))));

    let manual = harness
        .state
        .deployments
        .create(CreateDeployment::new("repo-react", COMMIT, Trigger::Manual))
        .await
        .unwrap();
    harness.wait_idle().await;

    let all = harness.store.list(&DeploymentQuery::all()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(harness.record(&manual.id).await.status, DeploymentStatus::Success);
}

#[tokio::test]
async fn test_pending_records_resume_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = StorageLayout::new(dir.path()).deployments_file();
    {
        let before_restart = MemoryStore::open(snapshot.clone()).await.unwrap();
        before_restart
            .insert(record(
                "dep-queued",
                COMMIT,
                DeploymentStatus::Pending,
                Utc::now() - Duration::hours(3),
            ))
            .await
            .unwrap();
    }

    let store = Arc::new(MemoryStore::open(snapshot).await.unwrap());
    let harness = Harness::with_store(store, vec![react_repository()]);
    assert_eq!(harness.record("dep-queued").await.status, DeploymentStatus::Pending);
    // the monitor only sweeps records that started
    assert!(harness.state.monitor.scan_active().await.unwrap().is_empty());

    let resumed = harness.state.deployments.resume_pending().await.unwrap();
    assert_eq!(resumed, 1);
    harness.wait_idle().await;

    let done = harness.record("dep-queued").await;
    assert_eq!(done.status, DeploymentStatus::Success);
    assert_eq!(done.preview_url.as_deref(), Some("https://dep-queued.preview.test"));
    assert_eq!(harness.state.deployments.resume_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn test_monitor_times_out_stuck_deployment() {
    let harness = Harness::new(vec![react_repository()]);
    let started = Utc::now() - Duration::minutes(45);
    harness
        .store
        .insert(record("dep-stuck", COMMIT, DeploymentStatus::Building, started))
        .await
        .unwrap();

    let failed = harness.state.monitor.scan_active().await.unwrap();
    assert_eq!(failed.len(), 1);

    let done = harness.record("dep-stuck").await;
    assert_eq!(done.status, DeploymentStatus::Failed);
    assert!(done
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("timed out"));
    assert_eq!(harness.notifier.kinds(), vec![EventKind::TimedOut]);

    let report = harness
        .state
        .recovery
        .analyze_failure("dep-stuck")
        .await
        .unwrap();
    assert_eq!(report.error_analysis.category, ErrorCategory::Timeout);

    // a second sweep finds nothing
    assert!(harness.state.monitor.scan_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_terminal_records_reject_transitions() {
    let harness = Harness::new(vec![react_repository()]);
    harness
        .store
        .insert(record("dep-done", COMMIT, DeploymentStatus::Success, Utc::now()))
        .await
        .unwrap();

    let cancel = harness.state.deployments.cancel("dep-done").await;
    assert!(matches!(cancel, Err(PipelineError::InvalidState(_))));

    let update = harness
        .state
        .deployments
        .update_status("dep-done", StatusUpdate::new(DeploymentStatus::Building))
        .await;
    assert!(matches!(update, Err(PipelineError::InvalidState(_))));

    let missing = harness
        .state
        .deployments
        .update_status("dep-missing", StatusUpdate::new(DeploymentStatus::Building))
        .await;
    assert!(matches!(missing, Err(PipelineError::NotFound(_))));
}

#[tokio::test]
async fn test_cancel_pending_deployment() {
    let harness = Harness::new(vec![react_repository()]);
    harness
        .store
        .insert(record("dep-queued", COMMIT, DeploymentStatus::Pending, Utc::now()))
        .await
        .unwrap();

    let cancelled = harness.state.deployments.cancel("dep-queued").await.unwrap();
    assert_eq!(cancelled.status, DeploymentStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());
    assert_eq!(harness.notifier.kinds(), vec![EventKind::Cancelled]);

    // the executor leaves a cancelled record alone
    harness.state.deployments.dispatcher().submit("dep-queued");
    harness.wait_idle().await;
    assert_eq!(
        harness.record("dep-queued").await.status,
        DeploymentStatus::Cancelled
    );
    assert!(harness.backend.commands().is_empty());
}

#[tokio::test]
async fn test_stats_by_project() {
    let harness = Harness::new(vec![react_repository()]);
    let now = Utc::now();
    let mut ok = record("dep-ok", COMMIT, DeploymentStatus::Success, now);
    ok.duration_secs = Some(120);
    harness.store.insert(ok).await.unwrap();
    let mut ok2 = record("dep-ok2", COMMIT, DeploymentStatus::Success, now);
    ok2.duration_secs = Some(60);
    ok2.trigger = Trigger::Manual;
    harness.store.insert(ok2).await.unwrap();
    harness
        .store
        .insert(record("dep-bad", COMMIT, DeploymentStatus::Failed, now))
        .await
        .unwrap();
    let mut other = record("dep-other", COMMIT, DeploymentStatus::Success, now);
    other.project_id = "proj-2".to_string();
    harness.store.insert(other).await.unwrap();

    let stats = harness.state.deployments.stats(Some("proj-1")).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_status["success"], 2);
    assert_eq!(stats.by_status["failed"], 1);
    assert_eq!(stats.by_status["pending"], 0);
    assert_eq!(stats.by_trigger["push"], 2);
    assert_eq!(stats.by_trigger["manual"], 1);
    assert_eq!(stats.avg_duration_secs, Some(90.0));
    assert_eq!(stats.recent.len(), 3);

    let all = harness.state.deployments.stats(None).await.unwrap();
    assert_eq!(all.total, 4);
}
