//! Operator HTTP API tests

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use launchpad::deploy::fsm::DeploymentStatus;
use launchpad::server::serve::router;
use launchpad::server::state::ServerState;
use launchpad::store::DeploymentStore;
use launchpad_models::{DeploymentResponse, ErrorResponse, HealthResponse, MetricsResponse};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use crate::support::{react_repository, record, Harness, COMMIT};

fn app(harness: &Harness) -> Router {
    router(Arc::new(ServerState::new(
        harness.state.deployments.clone(),
        harness.state.monitor.clone(),
        harness.state.recovery.clone(),
        24,
    )))
}

async fn get<T: DeserializeOwned>(app: Router, uri: &str) -> (StatusCode, T) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = Harness::new(vec![react_repository()]);

    let (status, body): (_, HealthResponse) = get(app(&harness), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.status, "healthy");
    assert_eq!(body.service, "launchpad");
    assert_eq!(body.in_flight, 0);
}

#[tokio::test]
async fn test_deployment_lookup() {
    let harness = Harness::new(vec![react_repository()]);
    let mut stored = record("dep-1", COMMIT, DeploymentStatus::Success, Utc::now());
    stored.preview_url = Some("https://dep-1.preview.test".to_string());
    harness.store.insert(stored).await.unwrap();

    let (status, body): (_, DeploymentResponse) = get(app(&harness), "/deployments/dep-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.status, "success");
    assert_eq!(body.env_var_names, vec!["NODE_ENV"]);
    assert_eq!(body.preview_url.as_deref(), Some("https://dep-1.preview.test"));

    let (status, body): (_, ErrorResponse) = get(app(&harness), "/deployments/dep-404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.error, "not_found");
}

#[tokio::test]
async fn test_metrics_window_validation() {
    let harness = Harness::new(vec![react_repository()]);
    harness
        .store
        .insert(record("dep-1", COMMIT, DeploymentStatus::Success, Utc::now()))
        .await
        .unwrap();
    harness
        .store
        .insert(record("dep-2", COMMIT, DeploymentStatus::Failed, Utc::now()))
        .await
        .unwrap();

    let (status, body): (_, MetricsResponse) = get(app(&harness), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.window_hours, 24);
    assert_eq!(body.total, 2);
    assert_eq!(body.successful, 1);
    assert_eq!(body.failed, 1);
    assert_eq!(body.success_rate, 50.0);

    let (status, body): (_, ErrorResponse) = get(app(&harness), "/metrics?window_hours=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.error, "validation_failure");

    let (status, _): (_, ErrorResponse) = get(app(&harness), "/metrics?window_hours=721").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_repository_health_endpoint() {
    let harness = Harness::new(vec![react_repository()]);

    let (status, body): (_, serde_json::Value) =
        get(app(&harness), "/repositories/repo-react/health?window_days=7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 100);
    assert_eq!(body["window_days"], 7);
}
