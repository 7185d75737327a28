//! API key issuance and verification tests

use chrono::{Duration, Utc};
use gate_service::models::HashVersion;
use gate_test_utils::*;
use reqwest::StatusCode;

async fn developer_token(server: &TestGateServer, email: &str) -> Result<String, anyhow::Error> {
    let body: serde_json::Value = reqwest::Client::new()
        .post(format!("{}/api/v1/dev/login", server.url()))
        .json(&serde_json::json!({"email": email, "password": TEST_DEVELOPER_PASSWORD}))
        .send()
        .await?
        .json()
        .await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("login response has no token"))
}

async fn create_key(
    server: &TestGateServer,
    token: &str,
    name: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(reqwest::Client::new()
        .post(format!("{}/api/v1/dev/api-keys", server.url()))
        .bearer_auth(token)
        .json(&serde_json::json!({"name": name}))
        .send()
        .await?)
}

/// A developer issues a key and the key authenticates on the agent route.
#[tokio::test]
async fn test_issued_key_authenticates() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;
    server.seed_developer(TEST_DEVELOPER_ALICE, "alice@example.com", 5)?;
    let token = developer_token(&server, "alice@example.com").await?;

    let response = create_key(&server, &token, "ci runner").await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: serde_json::Value = response.json().await?;

    let key = created["key"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("no key in response"))?
        .to_string();
    assert!(key.starts_with(created["prefix"].as_str().unwrap_or("-")));
    assert_eq!(created["role"], "agent");
    assert!(created.get("expires_at").is_none());

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/agent/me", server.url()))
        .bearer_auth(&key)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let principal: serde_json::Value = response.json().await?;
    assert_eq!(principal["id"], created["id"]);
    assert_eq!(principal["name"], "ci runner");
    assert_eq!(principal["developer_id"], TEST_DEVELOPER_ALICE.to_string());

    Ok(())
}

#[tokio::test]
async fn test_key_cap_is_enforced() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;
    server.seed_developer(TEST_DEVELOPER_BOB, "bob@example.com", 1)?;
    let token = developer_token(&server, "bob@example.com").await?;

    let response = create_key(&server, &token, "first").await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = create_key(&server, &token, "second").await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "MAX_KEYS_REACHED");

    assert_eq!(server.api_keys().records().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_blank_key_name_is_bad_request() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;
    server.seed_developer(TEST_DEVELOPER_ALICE, "alice@example.com", 5)?;
    let token = developer_token(&server, "alice@example.com").await?;

    let response = create_key(&server, &token, "   ").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

/// Keys hashed with the legacy SHA-256 scheme still verify.
#[tokio::test]
async fn test_legacy_key_authenticates_on_federation_route() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;
    server.seed_api_key(
        TestApiKey::new(TEST_API_KEY_LEGACY)
            .id(TEST_API_KEY_ID_1)
            .hash_version(HashVersion::LegacySha256),
    )?;

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/federation/me", server.url()))
        .bearer_auth(TEST_API_KEY_LEGACY)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let principal: serde_json::Value = response.json().await?;
    assert_eq!(principal["id"], TEST_API_KEY_ID_1.to_string());

    Ok(())
}

#[tokio::test]
async fn test_rejected_keys_are_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;
    server.seed_api_key(
        TestApiKey::new(TEST_API_KEY_BCRYPT)
            .id(TEST_API_KEY_ID_1)
            .inactive(),
    )?;
    server.seed_api_key(
        TestApiKey::new(TEST_API_KEY_LEGACY)
            .id(TEST_API_KEY_ID_2)
            .hash_version(HashVersion::LegacySha256)
            .expires_at(Utc::now() - Duration::hours(1)),
    )?;

    let client = reqwest::Client::new();
    let candidates = [
        TEST_API_KEY_BCRYPT,
        TEST_API_KEY_LEGACY,
        "BcRyPt02-right-prefix-but-wrong-remainder",
        "unknown1-no-record-with-this-prefix",
    ];

    for key in candidates {
        let response = client
            .get(format!("{}/api/v1/agent/me", server.url()))
            .bearer_auth(key)
            .send()
            .await?;
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "Key {} should be rejected",
            key
        );
    }

    Ok(())
}

/// Store failures during verification never surface as anything but 401.
#[tokio::test]
async fn test_store_failure_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;
    server.seed_api_key(TestApiKey::new(TEST_API_KEY_BCRYPT))?;
    server.api_keys().set_fail_lookups(true);

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/agent/me", server.url()))
        .bearer_auth(TEST_API_KEY_BCRYPT)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_successful_verification_touches_last_used() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn().await?;
    server.seed_api_key(TestApiKey::new(TEST_API_KEY_BCRYPT).id(TEST_API_KEY_ID_1))?;
    assert!(server.api_keys().last_used(TEST_API_KEY_ID_1).is_none());

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/agent/me", server.url()))
        .bearer_auth(TEST_API_KEY_BCRYPT)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.api_keys().last_used(TEST_API_KEY_ID_1).is_some());

    Ok(())
}
