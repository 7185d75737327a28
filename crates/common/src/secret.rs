//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use these types for
//! every value that must never reach a log line: the master secret, derived
//! signing keys, raw API keys, passwords and bearer tokens.
//!
//! `SecretBox<T>` and `SecretString` implement `Debug` with redaction, so any
//! struct that derives `Debug` while holding a secret gets safe logging
//! behavior for free. Secrets are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginRequest {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let req = LoginRequest {
//!     username: "alice".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! assert!(!format!("{req:?}").contains("hunter2"));
//! let password: &str = req.password.expose_secret();
//! assert_eq!(password, "hunter2");
//! ```
//!
//! # Gatehouse Usage Guidelines
//!
//! Use `SecretString` for:
//! - Admin and developer passwords
//! - Freshly issued API keys (returned to the caller exactly once)
//!
//! Use `SecretBox<T>` for:
//! - The master secret (`SecretBox<Vec<u8>>`)
//! - Derived signing keys (`SecretBox<[u8; 32]>`)

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
