//! `Authorization: Bearer <credential>` header parsing.
//!
//! The header value must split into exactly two whitespace-separated fields.
//! The scheme is compared case-insensitively.

use thiserror::Error;

/// Authentication scheme accepted by [`parse_bearer`].
pub const BEARER_SCHEME: &str = "Bearer";

/// Errors returned when extracting a bearer credential.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    /// The header is absent or blank.
    #[error("missing credential")]
    Missing,

    /// The header is present but not `Bearer <credential>`.
    #[error("malformed credential")]
    Malformed,
}

/// Extract the credential from an `Authorization` header value.
///
/// `None` and whitespace-only values are [`BearerError::Missing`]. Anything
/// other than exactly two fields with a `bearer` scheme (any case) is
/// [`BearerError::Malformed`].
///
/// # Errors
///
/// See [`BearerError`].
pub fn parse_bearer(header: Option<&str>) -> Result<&str, BearerError> {
    let header = match header {
        Some(h) if !h.trim().is_empty() => h,
        _ => return Err(BearerError::Missing),
    };

    let mut fields = header.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(scheme), Some(credential), None) if scheme.eq_ignore_ascii_case(BEARER_SCHEME) => {
            Ok(credential)
        }
        _ => Err(BearerError::Malformed),
    }
}
