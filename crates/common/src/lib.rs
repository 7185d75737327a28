//! Common utilities and types shared across Gatehouse crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, clock skew, iat validation)
pub mod jwt;

/// Module for parsing `Authorization: Bearer` credentials
pub mod bearer;
