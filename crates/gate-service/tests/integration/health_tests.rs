//! Health check and metrics endpoint tests

use gate_test_utils::TestGateServer;
use reqwest::StatusCode;

#[tokio::test]
async fn test_liveness() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;

    let response = reqwest::get(format!("{}/healthz", server.url())).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

#[tokio::test]
async fn test_readiness_follows_store() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;

    let response = reqwest::get(format!("{}/readyz", server.url())).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["database"], "healthy");

    server.api_keys().set_fail_lookups(true);

    let response = reqwest::get(format!("{}/readyz", server.url())).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["database"], "unhealthy");

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_served() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_not_found() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;

    let response = reqwest::get(format!("{}/api/v1/nope", server.url())).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}
