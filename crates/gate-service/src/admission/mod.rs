//! Admission control.
//!
//! Every request is classified into a [`Tier`] by the route it hits and keyed
//! by client identity ([`client_identity::client_key`]). The
//! [`AdmissionController`] keeps one token bucket per (tier, client key) and
//! decides whether the request may proceed.
//!
//! # Policy
//!
//! A tier with budget `N` per window `W` gets a bucket with burst `N` that
//! refills one token every `W / N`. The login tier uses a fifteen minute
//! window, so a budget of 5 allows five attempts and then one more every
//! three minutes.

pub mod client_identity;
pub mod limiter;
pub mod sweeper;

pub use limiter::{AdmissionController, DEFAULT_IDLE_TTL};
pub use sweeper::{spawn_sweeper, SweeperHandle};

use std::fmt;
use std::time::Duration;

/// Window used by every tier except [`Tier::Login`].
pub const STANDARD_WINDOW: Duration = Duration::from_secs(60);

/// Window used by [`Tier::Login`].
pub const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Named traffic class with its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Public,
    Agent,
    Admin,
    Login,
    Federation,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Public,
        Tier::Agent,
        Tier::Admin,
        Tier::Login,
        Tier::Federation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Agent => "agent",
            Tier::Admin => "admin",
            Tier::Login => "login",
            Tier::Federation => "federation",
        }
    }

    /// Environment variable holding this tier's budget.
    pub fn budget_env_var(&self) -> &'static str {
        match self {
            Tier::Public => "RATE_LIMIT_PUBLIC",
            Tier::Agent => "RATE_LIMIT_AGENT",
            Tier::Admin => "RATE_LIMIT_ADMIN",
            Tier::Login => "RATE_LIMIT_LOGIN",
            Tier::Federation => "RATE_LIMIT_FEDERATION",
        }
    }

    pub fn window(&self) -> Duration {
        match self {
            Tier::Login => LOGIN_WINDOW,
            _ => STANDARD_WINDOW,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests per window for each tier. Zero or negative disables limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierBudgets {
    pub public: i64,
    pub agent: i64,
    pub admin: i64,
    pub login: i64,
    pub federation: i64,
}

impl Default for TierBudgets {
    fn default() -> Self {
        Self {
            public: 60,
            agent: 300,
            admin: 0,
            login: 5,
            federation: 500,
        }
    }
}

impl TierBudgets {
    pub fn budget(&self, tier: Tier) -> i64 {
        match tier {
            Tier::Public => self.public,
            Tier::Agent => self.agent,
            Tier::Admin => self.admin,
            Tier::Login => self.login,
            Tier::Federation => self.federation,
        }
    }
}

/// Bucket shape for a limited tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    /// Bucket capacity, equal to the budget.
    pub burst: u32,
    /// Time to earn one token back, `window / budget`.
    pub refill_interval: Duration,
}

impl TierPolicy {
    /// Policy for `budget` requests per `window`; `None` when the budget disables limiting.
    pub fn new(budget: i64, window: Duration) -> Option<TierPolicy> {
        if budget <= 0 {
            return None;
        }
        let burst = u32::try_from(budget).unwrap_or(u32::MAX);
        Some(TierPolicy {
            burst,
            refill_interval: window / burst,
        })
    }

    pub fn for_tier(tier: Tier, budgets: &TierBudgets) -> Option<TierPolicy> {
        TierPolicy::new(budgets.budget(tier), tier.window())
    }

    /// `Retry-After` value: the refill interval rounded up to whole seconds, at least 1.
    pub fn retry_after_seconds(&self) -> u64 {
        let secs = self.refill_interval.as_secs();
        let rounded = if self.refill_interval.subsec_nanos() > 0 {
            secs.saturating_add(1)
        } else {
            secs
        };
        rounded.max(1)
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// The tier is not limited.
    Unlimited,
    /// A token was taken.
    Admitted,
    /// The bucket is empty.
    Rejected { retry_after_seconds: u64 },
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, AdmissionDecision::Rejected { .. })
    }

    /// Metric label.
    pub fn action(&self) -> &'static str {
        match self {
            AdmissionDecision::Unlimited => "unlimited",
            AdmissionDecision::Admitted => "admitted",
            AdmissionDecision::Rejected { .. } => "rejected",
        }
    }
}
