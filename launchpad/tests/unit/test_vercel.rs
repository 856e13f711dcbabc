//! Vercel platform tests against a mock API

use std::collections::BTreeMap;

use launchpad::deploy::platform::{HostingPlatform, PublishRequest, VercelPlatform};
use launchpad::errors::PipelineError;
use launchpad::models::project::ProjectType;
use secrecy::SecretString;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn site() -> (TempDir, PublishRequest) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("static")).unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>hello</h1>").unwrap();
    std::fs::write(dir.path().join("static/app.js"), "console.log(1)").unwrap();

    let request = PublishRequest {
        deployment_id: "dep-1".to_string(),
        project_id: "proj-1".to_string(),
        repository_name: "Marketing Site".to_string(),
        project_type: ProjectType::React,
        output_dir: dir.path().to_path_buf(),
        env_vars: BTreeMap::from([("NODE_ENV".to_string(), "production".to_string())]),
    };
    (dir, request)
}

fn platform(server: &MockServer, team_id: Option<&str>) -> VercelPlatform {
    VercelPlatform::new(
        &server.uri(),
        SecretString::from("test-token"),
        team_id.map(str::to_string),
    )
    .unwrap()
}

#[tokio::test]
async fn test_publish_returns_https_preview_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v13/deployments"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "name": "marketing-site",
            "projectSettings": { "framework": "create-react-app" },
            "build": { "env": { "NODE_ENV": "production" } },
            "meta": { "launchpadDeploymentId": "dep-1" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "dpl_123",
            "url": "marketing-site-abc.vercel.app",
            "readyState": "BUILDING"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, request) = site();
    let outcome = platform(&server, None).publish(&request).await.unwrap();

    assert_eq!(outcome.preview_url, "https://marketing-site-abc.vercel.app");
    assert!(outcome.log.contains("Uploaded 2 files"));
    assert!(outcome.log.contains("dpl_123 (BUILDING)"));
}

#[tokio::test]
async fn test_publish_scopes_to_team() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v13/deployments"))
        .and(query_param("teamId", "team_42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "dpl_456",
            "url": "https://site.vercel.app"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, request) = site();
    let outcome = platform(&server, Some("team_42"))
        .publish(&request)
        .await
        .unwrap();
    assert_eq!(outcome.preview_url, "https://site.vercel.app");
}

#[tokio::test]
async fn test_publish_without_env_sends_no_build_settings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v13/deployments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "dpl_789",
            "url": "site.vercel.app"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, mut request) = site();
    request.env_vars.clear();
    platform(&server, None).publish(&request).await.unwrap();

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body.get("build").is_none());
    assert_eq!(body["files"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_server_error_is_platform_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v13/deployments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal server error"))
        .mount(&server)
        .await;

    let (_dir, request) = site();
    let result = platform(&server, None).publish(&request).await;

    match result {
        Err(PipelineError::PlatformError(message)) => {
            assert!(message.contains("500"));
            assert!(message.contains("internal server error"));
        }
        other => panic!("expected platform error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_output_directory() {
    let server = MockServer::start().await;
    let (dir, mut request) = site();
    request.output_dir = dir.path().join("dist");

    let result = platform(&server, None).publish(&request).await;
    assert!(matches!(result, Err(PipelineError::PlatformError(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}
