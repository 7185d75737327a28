//! Test server harness for E2E testing
//!
//! Provides TestGateServer for spawning real Gatehouse server instances in
//! tests, backed by in-memory stores.

use crate::crypto_fixtures::{test_admin_codec, test_developer_codec, TestApiKey};
use crate::test_ids::{TEST_ADMIN_PASSWORD, TEST_DEVELOPER_PASSWORD};
use gate_service::admission::client_identity::IpCidr;
use gate_service::admission::{spawn_sweeper, AdmissionController, SweeperHandle, TierBudgets};
use gate_service::config::{DEFAULT_LIMITER_SWEEP_INTERVAL_SECONDS, MIN_BCRYPT_COST};
use gate_service::crypto;
use gate_service::models::{AdminUser, ApiKeyRecord, Developer};
use gate_service::observability::metrics::init_metrics_recorder;
use gate_service::repositories::mock::{
    InMemoryAdminUserStore, InMemoryApiKeyStore, InMemoryDeveloperStore,
};
use gate_service::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Test harness for spawning a Gatehouse server in E2E tests
///
/// Requests arrive from 127.0.0.1, which the harness trusts as a proxy, so a
/// test picks its client identity with the `X-Forwarded-For` header.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login_flow() -> Result<(), anyhow::Error> {
///     let server = TestGateServer::spawn().await?;
///     server.seed_admin("root", "admin")?;
///
///     let response = reqwest::Client::new()
///         .post(format!("{}/api/v1/admin/login", server.url()))
///         .json(&serde_json::json!({"username": "root", "password": TEST_ADMIN_PASSWORD}))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGateServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    api_keys: Arc<InMemoryApiKeyStore>,
    admin_users: Arc<InMemoryAdminUserStore>,
    developers: Arc<InMemoryDeveloperStore>,
    _sweeper: SweeperHandle,
    _handle: JoinHandle<()>,
}

impl TestGateServer {
    /// Spawn a server with the default tier budgets.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_budgets(TierBudgets::default()).await
    }

    /// Spawn a server with custom tier budgets.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Sign tokens with the deterministic test codecs
    /// - Start the idle-bucket sweeper and the HTTP server in the background
    pub async fn spawn_with_budgets(budgets: TierBudgets) -> Result<Self, anyhow::Error> {
        let api_keys = Arc::new(InMemoryApiKeyStore::new());
        let admin_users = Arc::new(InMemoryAdminUserStore::new());
        let developers = Arc::new(InMemoryDeveloperStore::new());

        let loopback = IpCidr::parse("127.0.0.0/8")
            .ok_or_else(|| anyhow::anyhow!("Failed to parse loopback range"))?;

        let admission = Arc::new(AdmissionController::new(budgets));
        let sweeper = spawn_sweeper(
            Arc::clone(&admission),
            Duration::from_secs(DEFAULT_LIMITER_SWEEP_INTERVAL_SECONDS),
        );

        let state = Arc::new(AppState {
            api_keys: api_keys.clone(),
            admin_users: admin_users.clone(),
            developers: developers.clone(),
            admin_codec: Arc::new(test_admin_codec()?),
            developer_codec: Arc::new(test_developer_codec()?),
            admission,
            trusted_proxies: Arc::new(vec![loopback]),
            bcrypt_cost: MIN_BCRYPT_COST,
        });

        // The global recorder can only be installed once per test process
        let metrics_handle = match init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        let app = routes::build_routes(state.clone(), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            api_keys,
            admin_users,
            developers,
            _sweeper: sweeper,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state (codecs, admission controller)
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn api_keys(&self) -> &InMemoryApiKeyStore {
        &self.api_keys
    }

    pub fn admin_users(&self) -> &InMemoryAdminUserStore {
        &self.admin_users
    }

    pub fn developers(&self) -> &InMemoryDeveloperStore {
        &self.developers
    }

    /// Seed an active admin user with [`TEST_ADMIN_PASSWORD`].
    pub fn seed_admin(&self, username: &str, role: &str) -> Result<AdminUser, anyhow::Error> {
        let user = AdminUser {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash: crypto::hash_password(TEST_ADMIN_PASSWORD, MIN_BCRYPT_COST)?,
            role: role.to_string(),
            is_active: true,
            last_login_at: None,
        };
        self.admin_users.insert(user.clone());
        Ok(user)
    }

    /// Seed an active developer with [`TEST_DEVELOPER_PASSWORD`].
    pub fn seed_developer(
        &self,
        id: Uuid,
        email: &str,
        max_keys: i32,
    ) -> Result<Developer, anyhow::Error> {
        let developer = Developer {
            id,
            email: email.to_string(),
            name: "Test Developer".to_string(),
            password_hash: crypto::hash_password(TEST_DEVELOPER_PASSWORD, MIN_BCRYPT_COST)?,
            max_keys,
            is_active: true,
            last_login_at: None,
        };
        self.developers.insert(developer.clone());
        Ok(developer)
    }

    /// Seed an API key record built from `key`.
    pub fn seed_api_key(&self, key: TestApiKey) -> Result<ApiKeyRecord, anyhow::Error> {
        let record = key.build()?;
        self.api_keys.insert(record.clone());
        Ok(record)
    }
}
