//! Idle-bucket sweeper background task.
//!
//! # Graceful Shutdown
//!
//! The task is owned by a [`SweeperHandle`]. `shutdown()` cancels the task and
//! waits for it to exit; dropping the handle cancels it without waiting.

use crate::admission::AdmissionController;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

/// Shortest interval the sweeper will tick at.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Owns the sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    cancel_token: CancellationToken,
    join_handle: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(target: "gate.admission", error = %e, "Limiter sweeper task failed");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Spawn a task that calls [`AdmissionController::sweep`] every `interval`.
///
/// The first sweep runs one full interval after spawning. Intervals outside
/// `[1s, idle TTL]` are clamped into that range.
pub fn spawn_sweeper(controller: Arc<AdmissionController>, interval: Duration) -> SweeperHandle {
    let interval = sweep_interval(interval, controller.idle_ttl());
    let cancel_token = CancellationToken::new();
    let task_token = cancel_token.clone();

    let join_handle = tokio::spawn(
        async move {
            info!(
                target: "gate.admission",
                interval_seconds = interval.as_secs(),
                "Limiter sweeper started"
            );

            let now = tokio::time::Instant::now();
            let start = now.checked_add(interval).unwrap_or(now);
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        controller.sweep();
                    }
                    _ = task_token.cancelled() => {
                        info!(target: "gate.admission", "Limiter sweeper shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(tracing::info_span!("limiter_sweeper")),
    );

    SweeperHandle {
        cancel_token,
        join_handle: Some(join_handle),
    }
}

fn sweep_interval(requested: Duration, idle_ttl: Duration) -> Duration {
    let max = idle_ttl.max(MIN_SWEEP_INTERVAL);
    if requested < MIN_SWEEP_INTERVAL || requested > max {
        let clamped = requested.clamp(MIN_SWEEP_INTERVAL, max);
        warn!(
            target: "gate.admission",
            requested_seconds = requested.as_secs(),
            interval_seconds = clamped.as_secs(),
            "Limiter sweep interval out of range, clamping"
        );
        return clamped;
    }
    requested
}
