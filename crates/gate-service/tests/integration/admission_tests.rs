//! End-to-end admission control tests
//!
//! The test server trusts loopback as a proxy, so each test chooses its
//! client identity with `X-Forwarded-For`.

use gate_test_utils::{TestGateServer, TEST_ADMIN_PASSWORD};
use reqwest::StatusCode;

async fn login_attempt(
    client: &reqwest::Client,
    server: &TestGateServer,
    client_ip: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(client
        .post(format!("{}/api/v1/admin/login", server.url()))
        .header("X-Forwarded-For", client_ip)
        .json(&serde_json::json!({"username": "nobody", "password": "wrong"}))
        .send()
        .await?)
}

async fn valid_login(
    client: &reqwest::Client,
    server: &TestGateServer,
    client_ip: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(client
        .post(format!("{}/api/v1/admin/login", server.url()))
        .header("X-Forwarded-For", client_ip)
        .json(&serde_json::json!({"username": "root", "password": TEST_ADMIN_PASSWORD}))
        .send()
        .await?)
}

/// Five logins succeed, the sixth is rejected with `Retry-After: 180`, and a
/// different client is unaffected.
#[tokio::test]
async fn test_login_tier_allows_five_then_rejects() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;
    server.seed_admin("root", "admin")?;
    let client = reqwest::Client::new();

    for attempt in 1..=5 {
        let response = valid_login(&client, &server, "198.51.100.10").await?;
        assert_eq!(
            response.status(),
            StatusCode::OK,
            "Login {} should be admitted",
            attempt
        );
    }

    let response = valid_login(&client, &server, "198.51.100.10").await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok()),
        Some("180")
    );
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
    assert!(body.get("token").is_none());

    let response = valid_login(&client, &server, "198.51.100.11").await?;
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "Another client should still be admitted"
    );

    Ok(())
}

/// The developer login shares the login tier bucket with admin login.
#[tokio::test]
async fn test_login_tier_is_shared_across_login_routes() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;
    let client = reqwest::Client::new();

    for _ in 0..5 {
        login_attempt(&client, &server, "198.51.100.20").await?;
    }

    let response = client
        .post(format!("{}/api/v1/dev/login", server.url()))
        .header("X-Forwarded-For", "198.51.100.20")
        .json(&serde_json::json!({"email": "dev@example.com", "password": "wrong"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    Ok(())
}

/// Health checks are never rate limited.
#[tokio::test]
async fn test_health_checks_are_exempt() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;
    let client = reqwest::Client::new();

    for _ in 0..50 {
        let response = client
            .get(format!("{}/healthz", server.url()))
            .header("X-Forwarded-For", "198.51.100.30")
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    Ok(())
}

/// Tiers keep separate buckets for the same client.
#[tokio::test]
async fn test_tiers_are_independent() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;
    let client = reqwest::Client::new();

    for _ in 0..6 {
        login_attempt(&client, &server, "198.51.100.40").await?;
    }

    // Public tier: still admitted, fails authentication instead
    let response = client
        .get(format!("{}/api/v1/dev/me", server.url()))
        .header("X-Forwarded-For", "198.51.100.40")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}
