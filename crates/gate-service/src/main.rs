//! Gatehouse
//!
//! Admission control and credential verification for the API edge.

use gate_service::admission::{spawn_sweeper, AdmissionController};
use gate_service::config::Config;
use gate_service::crypto;
use gate_service::observability::metrics::init_metrics_recorder;
use gate_service::repositories::{PgAdminUserStore, PgApiKeyStore, PgDeveloperStore};
use gate_service::routes::{self, AppState};
use gate_service::tokens::{AdminTokenCodec, DeveloperTokenCodec};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gate_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gatehouse");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        token_issuer = %config.token_issuer,
        trusted_proxies = config.trusted_proxies.len(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to install metrics recorder: {}", e);
        e
    })?;

    // Derive token signing keys from the master secret
    let clock_skew = Duration::from_secs(config.jwt_clock_skew_seconds.unsigned_abs());
    let admin_codec = AdminTokenCodec::new(
        crypto::derive_admin_jwt_key(config.master_secret_bytes())?,
        config.token_issuer.clone(),
        config.admin_token_ttl,
        clock_skew,
    );
    let developer_codec = DeveloperTokenCodec::new(
        crypto::derive_developer_jwt_key(config.master_secret_bytes())?,
        config.token_issuer.clone(),
        config.developer_token_ttl,
        clock_skew,
    );

    // Initialize database connection pool
    info!("Connecting to database...");
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    let admission = Arc::new(AdmissionController::new(config.tier_budgets));
    let sweeper = spawn_sweeper(Arc::clone(&admission), config.limiter_sweep_interval);

    let state = Arc::new(AppState {
        api_keys: Arc::new(PgApiKeyStore::new(db_pool.clone())),
        admin_users: Arc::new(PgAdminUserStore::new(db_pool.clone())),
        developers: Arc::new(PgDeveloperStore::new(db_pool)),
        admin_codec: Arc::new(admin_codec),
        developer_codec: Arc::new(developer_codec),
        admission,
        trusted_proxies: Arc::new(config.trusted_proxies.clone()),
        bcrypt_cost: config.bcrypt_cost,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Gatehouse listening on {}", addr);

    // Start server with ConnectInfo support (the admission key needs the peer address)
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.shutdown().await;

    info!("Gatehouse shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
