//! Per-(tier, client) token bucket limiter.
//!
//! Each bucket is a direct `governor` rate limiter whose quota is the tier's
//! burst and refill interval. Buckets read time through [`TokioClock`], so
//! tokio's paused clock drives refill in tests.

use crate::admission::{AdmissionDecision, Tier, TierBudgets, TierPolicy};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::{
    record_admission_decision, record_limiter_evictions, set_limiter_buckets,
};
use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Buckets idle for longer than this are removed by [`AdmissionController::sweep`].
///
/// Must exceed every tier's refill window (the longest is the 15 minute login window),
/// so an evicted bucket would have been full again anyway.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(15 * 60);

/// `governor` clock backed by `tokio::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        Instant::now().into_std()
    }
}

type DirectLimiter =
    RateLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<std::time::Instant>>;

/// Quota with `burst` cells, one earned back every `refill_interval`.
fn quota_for(policy: &TierPolicy) -> Option<Quota> {
    let burst = NonZeroU32::new(policy.burst)?;
    let quota = Quota::with_period(policy.refill_interval)?;
    Some(quota.allow_burst(burst))
}

#[derive(Debug, Clone, Copy)]
struct TierLimit {
    policy: TierPolicy,
    quota: Quota,
}

struct Bucket {
    limiter: DirectLimiter,
    last_seen: Instant,
}

impl Bucket {
    fn new(quota: Quota, now: Instant) -> Self {
        Self {
            limiter: RateLimiter::direct_with_clock(quota, &TokioClock),
            last_seen: now,
        }
    }

    fn try_take(&mut self, now: Instant) -> bool {
        self.last_seen = now;
        self.limiter.check().is_ok()
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("last_seen", &self.last_seen)
            .finish_non_exhaustive()
    }
}

/// Token bucket admission controller.
///
/// Buckets are created lazily on the first check of a (tier, client key) pair
/// and removed by [`sweep`](Self::sweep) once idle. All bucket state sits behind
/// one mutex, so checks on the same key are linearized and a sweep can never
/// remove a bucket in the middle of a check. The lock is never held across an
/// `.await`.
#[derive(Debug)]
pub struct AdmissionController {
    limits: HashMap<Tier, TierLimit>,
    idle_ttl: Duration,
    buckets: Mutex<HashMap<(Tier, String), Bucket>>,
}

impl AdmissionController {
    pub fn new(budgets: TierBudgets) -> Self {
        let limits = Tier::ALL
            .iter()
            .filter_map(|tier| {
                let policy = TierPolicy::for_tier(*tier, &budgets)?;
                let quota = quota_for(&policy)?;
                Some((*tier, TierLimit { policy, quota }))
            })
            .collect();

        Self {
            limits,
            idle_ttl: DEFAULT_IDLE_TTL,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Override the idle TTL (tests use a short one).
    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn policy(&self, tier: Tier) -> Option<TierPolicy> {
        self.limits.get(&tier).map(|limit| limit.policy)
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(Tier, String), Bucket>> {
        // A panic while holding the lock cannot leave a bucket half-updated
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically try to take one token for `client_key` in `tier`.
    pub fn check(&self, tier: Tier, client_key: &str) -> AdmissionDecision {
        let Some(limit) = self.limits.get(&tier).copied() else {
            record_admission_decision(tier.as_str(), AdmissionDecision::Unlimited.action());
            return AdmissionDecision::Unlimited;
        };

        let now = Instant::now();
        let (admitted, bucket_count) = {
            let mut buckets = self.lock();
            let bucket = buckets
                .entry((tier, client_key.to_string()))
                .or_insert_with(|| Bucket::new(limit.quota, now));
            let admitted = bucket.try_take(now);
            (admitted, buckets.len())
        };

        set_limiter_buckets(bucket_count);

        let policy = limit.policy;
        let decision = if admitted {
            AdmissionDecision::Admitted
        } else {
            tracing::debug!(
                target: "gate.admission",
                tier = tier.as_str(),
                client = %hash_for_correlation(client_key),
                retry_after_seconds = policy.retry_after_seconds(),
                "Request rejected by admission controller"
            );
            AdmissionDecision::Rejected {
                retry_after_seconds: policy.retry_after_seconds(),
            }
        };

        record_admission_decision(tier.as_str(), decision.action());
        decision
    }

    /// Remove buckets not seen for longer than the idle TTL. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle_ttl = self.idle_ttl;

        let (removed, remaining) = {
            let mut buckets = self.lock();
            let before = buckets.len();
            buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= idle_ttl);
            (before.saturating_sub(buckets.len()), buckets.len())
        };

        set_limiter_buckets(remaining);
        if removed > 0 {
            record_limiter_evictions(removed);
            tracing::debug!(
                target: "gate.admission",
                removed = removed,
                remaining = remaining,
                "Swept idle limiter buckets"
            );
        }

        removed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn login_only(budget: i64) -> AdmissionController {
        AdmissionController::new(TierBudgets {
            public: 0,
            agent: 0,
            admin: 0,
            login: budget,
            federation: 0,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_budget_admissions_then_rejection() {
        let controller = login_only(5);

        for i in 0..5 {
            assert_eq!(
                controller.check(Tier::Login, "198.51.100.7"),
                AdmissionDecision::Admitted,
                "request {} should be admitted",
                i + 1
            );
        }

        assert_eq!(
            controller.check(Tier::Login, "198.51.100.7"),
            AdmissionDecision::Rejected {
                retry_after_seconds: 180
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_keys_have_independent_budgets() {
        let controller = login_only(2);

        assert!(controller.check(Tier::Login, "a").is_allowed());
        assert!(controller.check(Tier::Login, "a").is_allowed());
        assert!(!controller.check(Tier::Login, "a").is_allowed());

        assert!(controller.check(Tier::Login, "b").is_allowed());
        assert!(controller.check(Tier::Login, "b").is_allowed());
        assert!(!controller.check(Tier::Login, "b").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiers_have_independent_buckets_for_same_client() {
        let controller = AdmissionController::new(TierBudgets {
            public: 1,
            agent: 1,
            admin: 0,
            login: 1,
            federation: 0,
        });

        assert!(controller.check(Tier::Public, "client").is_allowed());
        assert!(!controller.check(Tier::Public, "client").is_allowed());
        assert!(controller.check(Tier::Agent, "client").is_allowed());
        assert!(controller.check(Tier::Login, "client").is_allowed());
        assert_eq!(controller.bucket_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_refills_one_token_per_interval() {
        let controller = login_only(5);
        for _ in 0..5 {
            controller.check(Tier::Login, "client");
        }
        assert!(!controller.check(Tier::Login, "client").is_allowed());

        tokio::time::advance(Duration::from_secs(179)).await;
        assert!(!controller.check(Tier::Login, "client").is_allowed());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(controller.check(Tier::Login, "client").is_allowed());
        assert!(!controller.check(Tier::Login, "client").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped_at_burst() {
        let controller = login_only(3);
        controller.check(Tier::Login, "client");

        tokio::time::advance(Duration::from_secs(3600)).await;

        for _ in 0..3 {
            assert!(controller.check(Tier::Login, "client").is_allowed());
        }
        assert!(!controller.check(Tier::Login, "client").is_allowed());
    }

    #[test]
    fn test_quota_matches_tier_policy() {
        let policy = TierPolicy::for_tier(Tier::Login, &TierBudgets::default()).unwrap();
        let quota = quota_for(&policy).unwrap();
        assert_eq!(quota.burst_size().get(), 5);
        assert_eq!(quota.replenish_interval(), Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_bucket_refills_to_exact_burst() {
        let controller = login_only(5);
        for _ in 0..5 {
            controller.check(Tier::Login, "client");
        }

        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        for _ in 0..5 {
            assert!(controller.check(Tier::Login, "client").is_allowed());
        }
        assert_eq!(
            controller.check(Tier::Login, "client"),
            AdmissionDecision::Rejected {
                retry_after_seconds: 180
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_tier_is_unlimited_and_creates_no_bucket() {
        let controller = login_only(5);
        for _ in 0..1000 {
            assert_eq!(
                controller.check(Tier::Public, "client"),
                AdmissionDecision::Unlimited
            );
        }
        assert_eq!(controller.bucket_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_idle_and_keeps_fresh() {
        let controller = login_only(2);

        controller.check(Tier::Login, "stale");
        tokio::time::advance(Duration::from_secs(10 * 60)).await;
        controller.check(Tier::Login, "fresh");
        controller.check(Tier::Login, "fresh");
        let fresh_seen = controller
            .lock()
            .get(&(Tier::Login, "fresh".to_string()))
            .map(|bucket| bucket.last_seen)
            .unwrap();

        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        assert_eq!(controller.sweep(), 1);

        {
            let buckets = controller.lock();
            assert!(!buckets.contains_key(&(Tier::Login, "stale".to_string())));
            let fresh = buckets.get(&(Tier::Login, "fresh".to_string())).unwrap();
            assert_eq!(fresh.last_seen, fresh_seen);
        }

        // The surviving bucket keeps its limiter state: 6 minutes at one token
        // per 7.5 minutes earns nothing back
        assert!(!controller.check(Tier::Login, "fresh").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_check_refreshes_last_seen() {
        let controller = login_only(1);
        assert!(controller.check(Tier::Login, "client").is_allowed());

        tokio::time::advance(Duration::from_secs(14 * 60)).await;
        assert!(!controller.check(Tier::Login, "client").is_allowed());

        tokio::time::advance(Duration::from_secs(14 * 60)).await;
        assert_eq!(controller.sweep(), 0);
        assert_eq!(controller.bucket_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_swept_bucket_is_recreated_full() {
        let controller = login_only(2).with_idle_ttl(Duration::from_secs(60));
        controller.check(Tier::Login, "client");
        controller.check(Tier::Login, "client");
        assert!(!controller.check(Tier::Login, "client").is_allowed());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(controller.sweep(), 1);

        assert!(controller.check(Tier::Login, "client").is_allowed());
        assert!(controller.check(Tier::Login, "client").is_allowed());
    }

    #[test]
    fn test_concurrent_checks_do_not_lose_updates() {
        let controller = Arc::new(AdmissionController::new(TierBudgets {
            public: 100,
            agent: 0,
            admin: 0,
            login: 0,
            federation: 0,
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let controller = Arc::clone(&controller);
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| controller.check(Tier::Public, "shared").is_allowed())
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // 400 attempts against a burst of 100; refill during the run is at most a few tokens
        assert!(admitted >= 100, "admitted {admitted}");
        assert!(admitted <= 105, "admitted {admitted}");
    }
}
