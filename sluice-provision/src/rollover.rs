//! Once-per-day check of a key's active daily partition.
//!
//! Runs on the `Ready` fast path only when the key's last check predates
//! today. The check itself is single-flight per key: a caller that finds a
//! check in flight moves on, because the write alias still points at a
//! valid (yesterday's) partition.

use chrono::NaiveDate;
use dashmap::DashMap;
use sluice_core::{RemoteError, ResourceNames, TenantKey};
use sluice_remote::{Clock, RemoteResourceClient};
use std::sync::Arc;

use crate::metrics::ProvisioningMetrics;

/// Result of a rollover check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloverOutcome {
    /// The active partition is already today's.
    Current,
    /// The alias now points at `index`.
    RolledOver { index: String },
    /// Another caller is running the check for this key.
    InFlightElsewhere,
    /// The alias has no active write index. The day is still recorded as
    /// checked; the caller demotes the key so it is re-provisioned.
    AliasMissing,
}

#[derive(Debug, Clone, Default)]
struct RolloverEntry {
    last_checked: Option<NaiveDate>,
    in_flight: bool,
}

/// Per-key daily rollover state, separate from the provisioning cache.
pub struct DailyRolloverChecker {
    client: Arc<dyn RemoteResourceClient>,
    clock: Arc<dyn Clock>,
    prefix: String,
    metrics: Arc<ProvisioningMetrics>,
    entries: DashMap<TenantKey, RolloverEntry>,
}

/// Clears the in-flight flag when the check finishes or is dropped.
struct InFlightGuard<'a> {
    entries: &'a DashMap<TenantKey, RolloverEntry>,
    key: &'a TenantKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut entry) = self.entries.get_mut(self.key) {
            entry.in_flight = false;
        }
    }
}

impl DailyRolloverChecker {
    pub fn new(
        client: Arc<dyn RemoteResourceClient>,
        clock: Arc<dyn Clock>,
        prefix: impl Into<String>,
        metrics: Arc<ProvisioningMetrics>,
    ) -> Self {
        Self {
            client,
            clock,
            prefix: prefix.into(),
            metrics,
            entries: DashMap::new(),
        }
    }

    /// Whether `key` has not yet been checked today.
    pub fn needs_check(&self, key: &TenantKey) -> bool {
        let today = self.clock.today();
        self.entries
            .get(key)
            .map_or(true, |entry| entry.last_checked != Some(today))
    }

    /// Last day `key` was confirmed current.
    pub fn last_checked(&self, key: &TenantKey) -> Option<NaiveDate> {
        self.entries.get(key).and_then(|entry| entry.last_checked)
    }

    /// Record that `key`'s active partition is today's.
    pub fn record_checked(&self, key: &TenantKey) {
        let today = self.clock.today();
        self.entries.entry(key.clone()).or_default().last_checked = Some(today);
    }

    /// Drop everything known about `key`.
    pub fn forget(&self, key: &TenantKey) {
        self.entries.remove(key);
    }

    /// Run the check for `key`, at most once per key per day.
    ///
    /// On error `last_checked` is left untouched so the next event retries.
    pub async fn check(&self, key: &TenantKey) -> Result<RolloverOutcome, RemoteError> {
        let today = self.clock.today();

        // Claim the check; the map guard must not live across an await.
        {
            let mut entry = self.entries.entry(key.clone()).or_default();
            if entry.last_checked == Some(today) {
                return Ok(RolloverOutcome::Current);
            }
            if entry.in_flight {
                return Ok(RolloverOutcome::InFlightElsewhere);
            }
            entry.in_flight = true;
        }
        let _guard = InFlightGuard {
            entries: &self.entries,
            key,
        };

        let names = ResourceNames::for_key(&self.prefix, key);
        let Some(active) = self.client.active_write_index(&names.write_alias).await? else {
            tracing::warn!(
                tenant_key = %key,
                alias = %names.write_alias,
                "Write alias has no active index, skipping rollover"
            );
            self.mark_checked(key, today);
            return Ok(RolloverOutcome::AliasMissing);
        };

        let current = names
            .partition_date(&active)
            .is_some_and(|date| date >= today);
        if current {
            self.mark_checked(key, today);
            return Ok(RolloverOutcome::Current);
        }

        let target = names.daily_index(today);
        let index = match self.client.rollover(&names.write_alias, &target).await {
            Ok(index) => index,
            Err(RemoteError::Conflict { .. }) => target,
            Err(err) => {
                ProvisioningMetrics::incr(&self.metrics.rollover_failures);
                return Err(err);
            }
        };

        ProvisioningMetrics::incr(&self.metrics.rollovers);
        self.mark_checked(key, today);
        tracing::info!(
            tenant_key = %key,
            previous = %active,
            index = %index,
            "Rolled write alias over to new daily index"
        );
        Ok(RolloverOutcome::RolledOver { index })
    }

    fn mark_checked(&self, key: &TenantKey, day: NaiveDate) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.last_checked = Some(day);
        }
    }
}
