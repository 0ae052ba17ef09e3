//! Cursor guard: converts the host's eventually-consistent active-page
//! pointer into something callers can treat as transactional.
//!
//! The host applies `set_active` with unpredictable internal lag, so a single
//! assignment proves nothing. The guard asserts the pointer, waits a settle
//! delay, samples it, then waits a shorter verify delay and samples again.
//! Only two consecutive matching samples count as stable. Any mismatch starts
//! a fresh attempt, up to the configured ceiling.
//!
//! Both call sites (page switch before a row, re-acquire before each clone)
//! share this one implementation and one policy.

use crate::error::GuardError;
use crate::host::{DocumentHost, NodeId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Retry parameters for one guard acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub settle_delay_ms: u64,
    pub verify_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            settle_delay_ms: 200,
            verify_delay_ms: 100,
        }
    }
}

impl RetryPolicy {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }
}

/// Guard acquisition states, in the order a successful acquisition visits
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unlocked,
    Locking,
    Locked,
    Verifying,
    Stable,
    Failed,
}

impl std::fmt::Display for GuardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardState::Unlocked => write!(f, "unlocked"),
            GuardState::Locking => write!(f, "locking"),
            GuardState::Locked => write!(f, "locked"),
            GuardState::Verifying => write!(f, "verifying"),
            GuardState::Stable => write!(f, "stable"),
            GuardState::Failed => write!(f, "failed"),
        }
    }
}

/// Drives the active-page pointer onto `target` and holds until two
/// consecutive samples confirm it.
///
/// On success the pointer was observed stable at `target`; the caller must
/// still verify parentage after any mutation, since the host can displace the
/// pointer again at any time.
pub async fn acquire(
    host: &dyn DocumentHost,
    target: NodeId,
    policy: RetryPolicy,
) -> Result<u32, GuardError> {
    let target_name = host.node_name(target).unwrap_or_else(|| target.to_string());
    let mut attempts = 0;

    while attempts < policy.max_attempts {
        attempts += 1;
        tracing::trace!(target = %target_name, attempt = attempts, state = %GuardState::Locking, "asserting active page");
        host.set_active(target);
        sleep(policy.settle_delay()).await;

        if host.active() != target {
            tracing::trace!(target = %target_name, attempt = attempts, state = %GuardState::Locking, "settle sample mismatched");
            continue;
        }
        tracing::trace!(target = %target_name, attempt = attempts, state = %GuardState::Locked, "settle sample matched");

        sleep(policy.verify_delay()).await;
        if host.active() != target {
            tracing::trace!(target = %target_name, attempt = attempts, state = %GuardState::Verifying, "verify sample mismatched");
            continue;
        }

        tracing::debug!(target = %target_name, attempt = attempts, state = %GuardState::Stable, "active page locked");
        return Ok(attempts);
    }

    tracing::warn!(target = %target_name, attempts, state = %GuardState::Failed, "active page never settled");
    Err(GuardError {
        target: target_name,
        attempts,
    })
}
