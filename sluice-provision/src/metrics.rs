//! Provisioning counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the provisioning manager.
///
/// Incremented with relaxed ordering; values are only read as a
/// point-in-time [`ProvisioningSnapshot`].
#[derive(Debug, Default)]
pub struct ProvisioningMetrics {
    /// Calls to `ensure_provisioned`
    pub ensure_calls: AtomicU64,

    /// Calls answered by a `Ready` cache entry
    pub fast_path_hits: AtomicU64,

    /// Provisioning sequences started by an owner
    pub provisions_started: AtomicU64,

    pub provisions_succeeded: AtomicU64,

    pub provisions_failed: AtomicU64,

    /// Waiters that gave up after the poll bound
    pub waiter_timeouts: AtomicU64,

    /// Keys demoted after a resource-missing write error
    pub invalidations: AtomicU64,

    /// Write aliases moved to a new daily index
    pub rollovers: AtomicU64,

    pub rollover_failures: AtomicU64,
}

impl ProvisioningMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> ProvisioningSnapshot {
        ProvisioningSnapshot {
            ensure_calls: self.ensure_calls.load(Ordering::Relaxed),
            fast_path_hits: self.fast_path_hits.load(Ordering::Relaxed),
            provisions_started: self.provisions_started.load(Ordering::Relaxed),
            provisions_succeeded: self.provisions_succeeded.load(Ordering::Relaxed),
            provisions_failed: self.provisions_failed.load(Ordering::Relaxed),
            waiter_timeouts: self.waiter_timeouts.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            rollovers: self.rollovers.load(Ordering::Relaxed),
            rollover_failures: self.rollover_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of provisioning metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningSnapshot {
    pub ensure_calls: u64,
    pub fast_path_hits: u64,
    pub provisions_started: u64,
    pub provisions_succeeded: u64,
    pub provisions_failed: u64,
    pub waiter_timeouts: u64,
    pub invalidations: u64,
    pub rollovers: u64,
    pub rollover_failures: u64,
}
