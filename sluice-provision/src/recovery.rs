//! Cache invalidation driven by write-stage failures.
//!
//! Only `ResourceMissing` demotes a key. Every other classification leaves
//! the cache alone, so a permission or payload problem never turns into a
//! re-provisioning loop.
//!
//! Demotion goes through [`ProvisioningCache::invalidate`]: a key whose
//! owner is still running keeps that owner, and only loses `Ready` once the
//! owner finishes.

use sluice_core::{ProvisioningState, TenantKey, WriteDisposition, WriteErrorKind};
use std::sync::Arc;

use crate::cache::ProvisioningCache;
use crate::metrics::ProvisioningMetrics;
use crate::rollover::DailyRolloverChecker;

/// Reacts to write failures reported by the bulk layer.
#[derive(Clone)]
pub struct ErrorRecoveryHandler {
    cache: Arc<ProvisioningCache>,
    rollover: Option<Arc<DailyRolloverChecker>>,
    metrics: Arc<ProvisioningMetrics>,
}

impl ErrorRecoveryHandler {
    pub fn new(
        cache: Arc<ProvisioningCache>,
        rollover: Option<Arc<DailyRolloverChecker>>,
        metrics: Arc<ProvisioningMetrics>,
    ) -> Self {
        Self {
            cache,
            rollover,
            metrics,
        }
    }

    /// Handle a failed write targeting `key`'s resources.
    pub fn on_write_error(&self, key: &TenantKey, kind: WriteErrorKind) -> WriteDisposition {
        match kind {
            WriteErrorKind::ResourceMissing => {
                let previous = self.invalidate(key);
                tracing::info!(
                    tenant_key = %key,
                    previous = ?previous,
                    "Write target missing, invalidated provisioning state"
                );
                WriteDisposition::RetryAfterReprovision
            }
            other => {
                tracing::debug!(
                    tenant_key = %key,
                    kind = other.as_str(),
                    "Write error does not affect provisioning state"
                );
                WriteDisposition::Unchanged
            }
        }
    }

    /// Demote `key` so its next event re-checks the remote store, and drop
    /// its rollover record. Returns the state the key was in.
    pub fn invalidate(&self, key: &TenantKey) -> Option<ProvisioningState> {
        let previous = self.cache.invalidate(key);
        if let Some(rollover) = &self.rollover {
            rollover.forget(key);
        }
        ProvisioningMetrics::incr(&self.metrics.invalidations);
        previous
    }
}
