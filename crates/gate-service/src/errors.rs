//! Gatehouse error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Credential
//! failures collapse to one generic 401 body or one generic 403 body so a
//! caller cannot tell an unknown key from an unavailable datastore. The
//! detailed reason is only logged server-side and used as a metric label.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Gatehouse error type.
///
/// Maps to HTTP status codes:
/// - MissingCredential, MalformedCredential, InvalidCredential: 401 Unauthorized
/// - WrongCredentialType, InsufficientRole, KeyLimitReached: 403 Forbidden
/// - AdmissionRejected: 429 Too Many Requests (with `Retry-After`)
/// - BadRequest: 400 Bad Request
/// - Dependency: 503 Service Unavailable
/// - InvalidMasterSecret, Crypto, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Malformed credential")]
    MalformedCredential,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Wrong credential type")]
    WrongCredentialType,

    #[error("Insufficient role: required {required}")]
    InsufficientRole { required: String },

    #[error("Admission rejected: retry after {retry_after_seconds}s")]
    AdmissionRejected { retry_after_seconds: u64 },

    #[error("API key limit reached")]
    KeyLimitReached,

    #[error("Dependency failure: {0}")]
    Dependency(String),

    #[error("Invalid master secret")]
    InvalidMasterSecret,

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl GateError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::MissingCredential
            | GateError::MalformedCredential
            | GateError::InvalidCredential(_) => 401,
            GateError::WrongCredentialType
            | GateError::InsufficientRole { .. }
            | GateError::KeyLimitReached => 403,
            GateError::AdmissionRejected { .. } => 429,
            GateError::BadRequest(_) => 400,
            GateError::Dependency(_) => 503,
            GateError::InvalidMasterSecret | GateError::Crypto(_) | GateError::Internal => 500,
        }
    }

    /// Whether this error is one of the credential failure kinds.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            GateError::MissingCredential
                | GateError::MalformedCredential
                | GateError::InvalidCredential(_)
                | GateError::WrongCredentialType
                | GateError::InsufficientRole { .. }
        )
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GateError::MissingCredential
            | GateError::MalformedCredential
            | GateError::InvalidCredential(_) => {
                tracing::debug!(target: "gate.errors", error = %self, "Credential rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "The credential is missing, invalid or expired".to_string(),
                )
            }
            GateError::WrongCredentialType | GateError::InsufficientRole { .. } => {
                tracing::debug!(target: "gate.errors", error = %self, "Credential not permitted");
                (
                    StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "The credential does not permit this operation".to_string(),
                )
            }
            GateError::AdmissionRejected { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                "Too many requests. Please try again later.".to_string(),
            ),
            GateError::KeyLimitReached => (
                StatusCode::FORBIDDEN,
                "MAX_KEYS_REACHED",
                "Maximum number of API keys reached. Revoke an existing key first.".to_string(),
            ),
            GateError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            GateError::Dependency(reason) => {
                // Log actual reason server-side
                tracing::warn!(target: "gate.dependency", reason = %reason, "Dependency failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            GateError::InvalidMasterSecret | GateError::Crypto(_) => {
                tracing::error!(target: "gate.crypto", error = %self, "Cryptographic failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CRYPTO_ERROR",
                    "An internal cryptographic error occurred".to_string(),
                )
            }
            GateError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"gatehouse\""),
            );
        }

        if let GateError::AdmissionRejected {
            retry_after_seconds,
        } = self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_seconds));
        }

        response
    }
}

/// Convert sqlx errors to GateError
impl From<sqlx::Error> for GateError {
    fn from(err: sqlx::Error) -> Self {
        GateError::Dependency(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_invalid_credential() {
        let error = GateError::InvalidCredential("expired".to_string());
        assert_eq!(format!("{}", error), "Invalid credential: expired");
    }

    #[test]
    fn test_display_admission_rejected() {
        let error = GateError::AdmissionRejected {
            retry_after_seconds: 180,
        };
        assert_eq!(format!("{}", error), "Admission rejected: retry after 180s");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(GateError::MissingCredential.status_code(), 401);
        assert_eq!(GateError::MalformedCredential.status_code(), 401);
        assert_eq!(
            GateError::InvalidCredential("x".to_string()).status_code(),
            401
        );
        assert_eq!(GateError::WrongCredentialType.status_code(), 403);
        assert_eq!(
            GateError::InsufficientRole {
                required: "admin".to_string()
            }
            .status_code(),
            403
        );
        assert_eq!(GateError::KeyLimitReached.status_code(), 403);
        assert_eq!(
            GateError::AdmissionRejected {
                retry_after_seconds: 1
            }
            .status_code(),
            429
        );
        assert_eq!(GateError::BadRequest("x".to_string()).status_code(), 400);
        assert_eq!(GateError::Dependency("x".to_string()).status_code(), 503);
        assert_eq!(GateError::InvalidMasterSecret.status_code(), 500);
        assert_eq!(GateError::Crypto("x".to_string()).status_code(), 500);
        assert_eq!(GateError::Internal.status_code(), 500);
    }

    #[tokio::test]
    async fn test_credential_failures_share_one_body() {
        let errors = vec![
            GateError::MissingCredential,
            GateError::MalformedCredential,
            GateError::InvalidCredential("unknown prefix".to_string()),
            GateError::InvalidCredential("datastore unavailable".to_string()),
        ];

        let mut bodies = Vec::new();
        for error in errors {
            let response = error.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
                "Bearer realm=\"gatehouse\""
            );
            bodies.push(read_body_json(response.into_body()).await);
        }

        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(bodies[0]["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_forbidden_hides_discriminator_mismatch() {
        let wrong_type = GateError::WrongCredentialType.into_response();
        let wrong_role = GateError::InsufficientRole {
            required: "admin".to_string(),
        }
        .into_response();

        assert_eq!(wrong_type.status(), StatusCode::FORBIDDEN);
        assert_eq!(wrong_role.status(), StatusCode::FORBIDDEN);
        assert!(wrong_type.headers().get(header::WWW_AUTHENTICATE).is_none());

        let a = read_body_json(wrong_type.into_body()).await;
        let b = read_body_json(wrong_role.into_body()).await;
        assert_eq!(a, b);
        assert!(!a.to_string().contains("admin"));
    }

    #[tokio::test]
    async fn test_admission_rejected_sets_retry_after() {
        let response = GateError::AdmissionRejected {
            retry_after_seconds: 180,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "180");

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
    }

    #[tokio::test]
    async fn test_dependency_error_is_generic() {
        let response =
            GateError::Dependency("connection refused to 10.0.0.5".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["message"], "Service temporarily unavailable");
    }

    #[tokio::test]
    async fn test_bad_request_keeps_reason() {
        let response = GateError::BadRequest("name is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["message"], "name is required");
    }

    #[test]
    fn test_is_credential_failure() {
        assert!(GateError::MissingCredential.is_credential_failure());
        assert!(GateError::WrongCredentialType.is_credential_failure());
        assert!(!GateError::Internal.is_credential_failure());
        assert!(!GateError::AdmissionRejected {
            retry_after_seconds: 1
        }
        .is_credential_failure());
    }

    #[test]
    fn test_from_sqlx_error() {
        let error: GateError = sqlx::Error::RowNotFound.into();
        assert!(matches!(error, GateError::Dependency(_)));
    }
}
