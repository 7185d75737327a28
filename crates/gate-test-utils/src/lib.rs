//! # Gatehouse Test Utilities
//!
//! Shared test utilities for the Gatehouse service.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed master secret, codecs, API keys)
//! - Token builders for forging edge-case tokens
//! - In-memory stores (re-exported from `gate_service::repositories::mock`)
//! - Server test harness (TestGateServer for E2E tests)
//! - Fixed test IDs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gate_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestGateServer::spawn().await?;
//!     let token = TestTokenBuilder::admin("root").sign(&test_admin_key()?)?;
//!     // ...
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use gate_service::repositories::mock::{
    InMemoryAdminUserStore, InMemoryApiKeyStore, InMemoryDeveloperStore,
};
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;
