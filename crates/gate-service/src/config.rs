//! Gatehouse configuration.
//!
//! Configuration is loaded from environment variables. The database URL and
//! the master secret are redacted in Debug output.

use crate::admission::client_identity::{parse_trusted_proxies, IpCidr};
use crate::admission::{Tier, TierBudgets, DEFAULT_IDLE_TTL};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretBox};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Minimum master secret length in bytes.
pub const MIN_MASTER_SECRET_BYTES: usize = 32;

/// Default token issuer.
pub const DEFAULT_TOKEN_ISSUER: &str = "gatehouse";

/// Default admin token lifetime in hours.
pub const DEFAULT_ADMIN_TOKEN_TTL_HOURS: u64 = 24;

/// Default developer token lifetime in hours (7 days).
pub const DEFAULT_DEVELOPER_TOKEN_TTL_HOURS: u64 = 168;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum bcrypt cost factor (OWASP 2024).
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum bcrypt cost factor (keeps login latency bounded).
pub const MAX_BCRYPT_COST: u32 = 14;

/// Default interval between idle-bucket sweeps (5 minutes).
pub const DEFAULT_LIMITER_SWEEP_INTERVAL_SECONDS: u64 = 300;

/// Maximum interval between idle-bucket sweeps (the bucket idle TTL).
pub const MAX_LIMITER_SWEEP_INTERVAL_SECONDS: u64 = DEFAULT_IDLE_TTL.as_secs();

/// Gatehouse configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Master secret all token signing keys are derived from.
    pub master_secret: Arc<SecretBox<Vec<u8>>>,

    /// `iss` claim written to and required on every token.
    pub token_issuer: String,

    /// Admin token lifetime.
    pub admin_token_ttl: Duration,

    /// Developer token lifetime.
    pub developer_token_ttl: Duration,

    /// JWT clock skew tolerance in seconds for `iat` validation.
    pub jwt_clock_skew_seconds: i64,

    /// Bcrypt cost factor for newly hashed API keys.
    pub bcrypt_cost: u32,

    /// Per-tier request budgets. A budget of zero disables limiting.
    pub tier_budgets: TierBudgets,

    /// Proxy ranges whose forwarding headers are trusted.
    pub trusted_proxies: Vec<IpCidr>,

    /// Interval between idle-bucket sweeps.
    pub limiter_sweep_interval: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("master_secret", &"[REDACTED]")
            .field("token_issuer", &self.token_issuer)
            .field("admin_token_ttl", &self.admin_token_ttl)
            .field("developer_token_ttl", &self.developer_token_ttl)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("tier_budgets", &self.tier_budgets)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("limiter_sweep_interval", &self.limiter_sweep_interval)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid master secret: {0}")]
    InvalidMasterSecret(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid bcrypt cost configuration: {0}")]
    InvalidBcryptCost(String),

    #[error("Invalid rate limit configuration: {0}")]
    InvalidRateLimit(String),

    #[error("Invalid token lifetime configuration: {0}")]
    InvalidTokenTtl(String),

    #[error("Invalid trusted proxy configuration: {0}")]
    InvalidTrustedProxy(String),

    #[error("Invalid limiter sweep interval: {0}")]
    InvalidSweepInterval(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let master_secret = vars
            .get("GATE_MASTER_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("GATE_MASTER_SECRET".to_string()))?;

        if master_secret.len() < MIN_MASTER_SECRET_BYTES {
            return Err(ConfigError::InvalidMasterSecret(format!(
                "GATE_MASTER_SECRET must be at least {} bytes, got {}",
                MIN_MASTER_SECRET_BYTES, master_secret.len()
            )));
        }
        let master_secret = Arc::new(SecretBox::new(Box::new(master_secret.as_bytes().to_vec())));

        let token_issuer = vars
            .get("TOKEN_ISSUER")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOKEN_ISSUER.to_string());

        let admin_token_ttl = parse_ttl_hours(
            vars,
            "ADMIN_TOKEN_TTL_HOURS",
            DEFAULT_ADMIN_TOKEN_TTL_HOURS,
        )?;
        let developer_token_ttl = parse_ttl_hours(
            vars,
            "DEVELOPER_TOKEN_TTL_HOURS",
            DEFAULT_DEVELOPER_TOKEN_TTL_HOURS,
        )?;

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            #[allow(clippy::cast_possible_wrap)]
            let max = MAX_CLOCK_SKEW.as_secs() as i64;
            if value > max {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    max, value
                )));
            }

            value
        } else {
            #[allow(clippy::cast_possible_wrap)]
            let default = DEFAULT_CLOCK_SKEW.as_secs() as i64;
            default
        };

        // Parse bcrypt cost with validation
        let bcrypt_cost = if let Some(value_str) = vars.get("BCRYPT_COST") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&value) {
                return Err(ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be between {} and {}, got {}",
                    MIN_BCRYPT_COST, MAX_BCRYPT_COST, value
                )));
            }

            value
        } else {
            DEFAULT_BCRYPT_COST
        };

        let defaults = TierBudgets::default();
        let tier_budgets = TierBudgets {
            public: parse_budget(vars, Tier::Public, defaults.public)?,
            agent: parse_budget(vars, Tier::Agent, defaults.agent)?,
            admin: parse_budget(vars, Tier::Admin, defaults.admin)?,
            login: parse_budget(vars, Tier::Login, defaults.login)?,
            federation: parse_budget(vars, Tier::Federation, defaults.federation)?,
        };

        let trusted_proxies = match vars.get("TRUSTED_PROXY_CIDRS") {
            Some(value) => parse_trusted_proxies(value).map_err(|entry| {
                ConfigError::InvalidTrustedProxy(format!(
                    "TRUSTED_PROXY_CIDRS contains an invalid entry: '{}'",
                    entry
                ))
            })?,
            None => Vec::new(),
        };

        let limiter_sweep_interval = match vars.get("LIMITER_SWEEP_INTERVAL_SECONDS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidSweepInterval(format!(
                        "LIMITER_SWEEP_INTERVAL_SECONDS must be a positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidSweepInterval(
                        "LIMITER_SWEEP_INTERVAL_SECONDS must be greater than 0".to_string(),
                    ));
                }

                if value > MAX_LIMITER_SWEEP_INTERVAL_SECONDS {
                    return Err(ConfigError::InvalidSweepInterval(format!(
                        "LIMITER_SWEEP_INTERVAL_SECONDS must be at most {}, got {}",
                        MAX_LIMITER_SWEEP_INTERVAL_SECONDS, value
                    )));
                }

                Duration::from_secs(value)
            }
            None => Duration::from_secs(DEFAULT_LIMITER_SWEEP_INTERVAL_SECONDS),
        };

        Ok(Config {
            database_url,
            bind_address,
            master_secret,
            token_issuer,
            admin_token_ttl,
            developer_token_ttl,
            jwt_clock_skew_seconds,
            bcrypt_cost,
            tier_budgets,
            trusted_proxies,
            limiter_sweep_interval,
        })
    }

    /// Borrow the master secret bytes.
    pub fn master_secret_bytes(&self) -> &[u8] {
        self.master_secret.expose_secret()
    }
}

fn parse_ttl_hours(
    vars: &HashMap<String, String>,
    name: &str,
    default_hours: u64,
) -> Result<Duration, ConfigError> {
    let hours = match vars.get(name) {
        Some(value_str) => {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidTokenTtl(format!(
                    "{} must be a valid positive integer, got '{}': {}",
                    name, value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidTokenTtl(format!(
                    "{} must be greater than 0",
                    name
                )));
            }

            value
        }
        None => default_hours,
    };

    Ok(Duration::from_secs(hours.saturating_mul(3600)))
}

/// Budgets are signed: zero or a negative value disables limiting for the tier.
fn parse_budget(
    vars: &HashMap<String, String>,
    tier: Tier,
    default: i64,
) -> Result<i64, ConfigError> {
    let name = tier.budget_env_var();
    match vars.get(name) {
        Some(value_str) => value_str.trim().parse().map_err(|e| {
            ConfigError::InvalidRateLimit(format!(
                "{} must be a valid integer, got '{}': {}",
                name, value_str, e
            ))
        }),
        None => Ok(default),
    }
}
