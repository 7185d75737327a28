//! Password login for admin users and developers.
//!
//! Both flows always run one bcrypt verification, against a dummy hash when
//! the account does not exist, so response time does not reveal which
//! usernames or emails are registered.

use crate::crypto::{self, DUMMY_BCRYPT_HASH};
use crate::errors::GateError;
use crate::models::{AdminUser, Developer};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_login;
use crate::repositories::{AdminUserStore, DeveloperStore};
use crate::tokens::{AdminTokenCodec, DeveloperTokenCodec, IssuedToken};
use tracing::instrument;

const INVALID_LOGIN: &str = "Invalid credentials";

/// Successful admin login.
#[derive(Debug)]
pub struct AdminLogin {
    pub user: AdminUser,
    pub token: IssuedToken,
}

/// Successful developer login.
#[derive(Debug)]
pub struct DeveloperLogin {
    pub developer: Developer,
    pub token: IssuedToken,
}

/// Verify a password against an optional stored hash. Malformed hashes never match.
fn password_matches(password: &str, stored_hash: Option<&str>) -> bool {
    let hash = stored_hash.unwrap_or(DUMMY_BCRYPT_HASH);
    match crypto::verify_password(password, hash) {
        Ok(valid) => valid && stored_hash.is_some(),
        Err(e) => {
            tracing::warn!(target: "gate.crypto", error = %e, "Stored password hash is malformed");
            false
        }
    }
}

/// Authenticate an admin user and issue an admin token.
///
/// # Errors
///
/// `InvalidCredential` for an unknown user, wrong password or inactive account.
/// Store failures propagate as `Dependency`.
#[instrument(skip_all, name = "gate.login.admin")]
pub async fn admin_login(
    store: &dyn AdminUserStore,
    codec: &AdminTokenCodec,
    username: &str,
    password: &str,
) -> Result<AdminLogin, GateError> {
    let username = username.trim();
    let user = store.find_by_username(username).await.inspect_err(|_| {
        record_login("admin", "error");
    })?;

    let valid = password_matches(password, user.as_ref().map(|u| u.password_hash.as_str()));

    let user = match user {
        Some(user) if valid && user.is_active => user,
        _ => {
            tracing::info!(
                target: "gate.login",
                account = "admin",
                user = %hash_for_correlation(username),
                "Login failed"
            );
            record_login("admin", "error");
            return Err(GateError::InvalidCredential(INVALID_LOGIN.to_string()));
        }
    };

    let token = codec.generate(&user.username, &user.role)?;

    if let Err(e) = store.update_last_login(user.id).await {
        tracing::warn!(target: "gate.login", error = %e, "Failed to record admin last login");
    }

    tracing::info!(
        target: "gate.login",
        account = "admin",
        user = %hash_for_correlation(&user.username),
        "Login succeeded"
    );
    record_login("admin", "success");

    Ok(AdminLogin { user, token })
}

/// Authenticate a developer and issue a developer token.
///
/// # Errors
///
/// `InvalidCredential` for an unknown email, wrong password or inactive account.
/// Store failures propagate as `Dependency`.
#[instrument(skip_all, name = "gate.login.developer")]
pub async fn developer_login(
    store: &dyn DeveloperStore,
    codec: &DeveloperTokenCodec,
    email: &str,
    password: &str,
) -> Result<DeveloperLogin, GateError> {
    let email = email.trim();
    let developer = store.find_by_email(email).await.inspect_err(|_| {
        record_login("developer", "error");
    })?;

    let valid = password_matches(
        password,
        developer.as_ref().map(|d| d.password_hash.as_str()),
    );

    let developer = match developer {
        Some(developer) if valid && developer.is_active => developer,
        _ => {
            tracing::info!(
                target: "gate.login",
                account = "developer",
                user = %hash_for_correlation(&email.to_ascii_lowercase()),
                "Login failed"
            );
            record_login("developer", "error");
            return Err(GateError::InvalidCredential(INVALID_LOGIN.to_string()));
        }
    };

    let token = codec.generate(developer.id, &developer.email, &developer.name)?;

    if let Err(e) = store.update_last_login(developer.id).await {
        tracing::warn!(target: "gate.login", error = %e, "Failed to record developer last login");
    }

    tracing::info!(
        target: "gate.login",
        account = "developer",
        user = %hash_for_correlation(&developer.id.to_string()),
        "Login succeeded"
    );
    record_login("developer", "success");

    Ok(DeveloperLogin { developer, token })
}
