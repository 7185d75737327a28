//! HTTP request handlers for Gatehouse.

pub mod api_keys;
pub mod auth;
pub mod health;
pub mod identity;
pub mod metrics;

pub use api_keys::create_api_key;
pub use auth::{admin_login, developer_login};
pub use health::{healthz, readyz};
pub use identity::{get_admin_me, get_agent_me, get_developer_me, get_federation_me};
pub use metrics::metrics_handler;
