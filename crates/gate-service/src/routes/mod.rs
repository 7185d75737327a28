//! HTTP routes for Gatehouse.
//!
//! Defines the Axum router and application state.

use crate::admission::client_identity::IpCidr;
use crate::admission::{AdmissionController, Tier};
use crate::handlers;
use crate::middleware::{
    admission_middleware, api_key_usage_middleware, http_metrics_middleware, require_admin,
    require_api_key, require_developer, AdmissionState, AuthState,
};
use crate::repositories::{AdminUserStore, ApiKeyStore, DeveloperStore};
use crate::tokens::{AdminTokenCodec, DeveloperTokenCodec};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub admin_users: Arc<dyn AdminUserStore>,
    pub developers: Arc<dyn DeveloperStore>,
    pub admin_codec: Arc<AdminTokenCodec>,
    pub developer_codec: Arc<DeveloperTokenCodec>,

    /// Shared by every tier's admission layer.
    pub admission: Arc<AdmissionController>,

    /// Proxy ranges whose forwarding headers are trusted.
    pub trusted_proxies: Arc<Vec<IpCidr>>,

    /// Cost factor for newly issued API key hashes.
    pub bcrypt_cost: u32,
}

impl AppState {
    fn admission_state(&self, tier: Tier) -> Arc<AdmissionState> {
        Arc::new(AdmissionState {
            controller: Arc::clone(&self.admission),
            tier,
            trusted_proxies: Arc::clone(&self.trusted_proxies),
        })
    }

    fn auth_state(&self) -> Arc<AuthState> {
        Arc::new(AuthState {
            admin_codec: Arc::clone(&self.admin_codec),
            developer_codec: Arc::clone(&self.developer_codec),
            api_keys: Arc::clone(&self.api_keys),
        })
    }
}

/// Build the application routes.
///
/// - `/healthz`, `/readyz` - Health checks, never rate limited
/// - `/metrics` - Prometheus scrape endpoint
/// - `/api/v1/admin/login`, `/api/v1/dev/login` - Login tier
/// - `/api/v1/admin/me` - Admin tier, admin token with admin role
/// - `/api/v1/dev/me`, `/api/v1/dev/api-keys` - Public tier, developer token
/// - `/api/v1/agent/me` - Agent tier, API key
/// - `/api/v1/federation/me` - Federation tier, API key
///
/// Admission runs before authentication in every group, so rejected clients
/// never reach a verifier.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = state.auth_state();

    let health_routes = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let login_routes = Router::new()
        .route("/api/v1/admin/login", post(handlers::admin_login))
        .route("/api/v1/dev/login", post(handlers::developer_login))
        .route_layer(middleware::from_fn_with_state(
            state.admission_state(Tier::Login),
            admission_middleware,
        ))
        .with_state(state.clone());

    // Layers run bottom-to-top: admission, then authentication
    let admin_routes = Router::new()
        .route("/api/v1/admin/me", get(handlers::get_admin_me))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_admin,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.admission_state(Tier::Admin),
            admission_middleware,
        ));

    let developer_routes = Router::new()
        .route("/api/v1/dev/me", get(handlers::get_developer_me))
        .route("/api/v1/dev/api-keys", post(handlers::create_api_key))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_developer,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.admission_state(Tier::Public),
            admission_middleware,
        ))
        .with_state(state.clone());

    let agent_routes = Router::new()
        .route("/api/v1/agent/me", get(handlers::get_agent_me))
        .route_layer(middleware::from_fn(api_key_usage_middleware))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_api_key,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.admission_state(Tier::Agent),
            admission_middleware,
        ));

    let federation_routes = Router::new()
        .route("/api/v1/federation/me", get(handlers::get_federation_me))
        .route_layer(middleware::from_fn(api_key_usage_middleware))
        .route_layer(middleware::from_fn_with_state(auth_state, require_api_key))
        .route_layer(middleware::from_fn_with_state(
            state.admission_state(Tier::Federation),
            admission_middleware,
        ));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    health_routes
        .merge(metrics_routes)
        .merge(login_routes)
        .merge(admin_routes)
        .merge(developer_routes)
        .merge(agent_routes)
        .merge(federation_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}
