//! Single-flight provisioning manager.
//!
//! ```text
//! get(key) == Ready ──────────────────────────────▶ Ok (no remote calls)
//!        │
//!        ▼
//! put_if_absent(key)
//!   ├─ Ok(ticket)        owner:  provision ─▶ mark_ready │ release + Err
//!   ├─ Err(Ready)        lost a race that already finished ─▶ Ok
//!   └─ Err(Initializing) waiter: poll get(key) every interval,
//!                                at most max_attempts times ─▶ Ok │ Err
//! ```
//!
//! Exactly one caller per key runs the remote creation sequence per
//! provisioning cycle. Waiters never treat a timeout as success.

use sluice_core::{
    ConfigError, ErrorClass, ProvisionError, ProvisioningConfig, ProvisioningState, TenantKey,
    WriteDisposition, WriteErrorKind,
};
use sluice_remote::{
    Clock, DefaultSpecBuilder, RemoteResourceClient, ResourceSpecBuilder, SystemClock,
};
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::cache::{OwnerTicket, ProvisioningCache};
use crate::metrics::{ProvisioningMetrics, ProvisioningSnapshot};
use crate::provisioner::ResourceProvisioner;
use crate::recovery::ErrorRecoveryHandler;
use crate::rollover::{DailyRolloverChecker, RolloverOutcome};

// ============================================================================
// OWNER GUARD
// ============================================================================

/// Holds the owner's `Initializing` claim.
///
/// Dropping the guard without calling [`OwnerGuard::complete`] releases the
/// claim, so a cancelled owner never leaves the key stuck in
/// `Initializing`.
struct OwnerGuard<'a> {
    cache: &'a ProvisioningCache,
    key: &'a TenantKey,
    ticket: Option<OwnerTicket>,
}

impl<'a> OwnerGuard<'a> {
    fn new(cache: &'a ProvisioningCache, key: &'a TenantKey, ticket: OwnerTicket) -> Self {
        Self {
            cache,
            key,
            ticket: Some(ticket),
        }
    }

    /// Promote the claim to `Ready`. False if it was invalidated meanwhile.
    fn complete(mut self) -> bool {
        match self.ticket.take() {
            Some(ticket) => self.cache.mark_ready(self.key, &ticket),
            None => false,
        }
    }

    /// Release the claim after a failed attempt.
    fn release(mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.cache.release(self.key, &ticket);
        }
    }
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            if self.cache.release(self.key, &ticket) {
                tracing::warn!(
                    tenant_key = %self.key,
                    generation = ticket.generation(),
                    "Provisioning owner dropped before completion, claim released"
                );
            }
        }
    }
}

// ============================================================================
// MANAGER
// ============================================================================

struct ManagerInner {
    cache: Arc<ProvisioningCache>,
    provisioner: ResourceProvisioner,
    rollover: Option<Arc<DailyRolloverChecker>>,
    recovery: ErrorRecoveryHandler,
    metrics: Arc<ProvisioningMetrics>,
    config: ProvisioningConfig,
}

/// Entry point for the ingestion and write pipeline.
///
/// Cheap to clone; all clones share one cache.
#[derive(Clone)]
pub struct ProvisioningManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for ProvisioningManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningManager")
            .field("config", &self.inner.config)
            .field("cached_keys", &self.inner.cache.len())
            .finish()
    }
}

impl ProvisioningManager {
    pub fn builder(
        client: Arc<dyn RemoteResourceClient>,
        config: ProvisioningConfig,
    ) -> ProvisioningManagerBuilder {
        ProvisioningManagerBuilder {
            client,
            config,
            clock: Arc::new(SystemClock),
            specs: Arc::new(DefaultSpecBuilder::default()),
        }
    }

    /// Manager with the system clock and default resource bodies.
    pub fn new(
        client: Arc<dyn RemoteResourceClient>,
        config: ProvisioningConfig,
    ) -> Result<Self, ConfigError> {
        Self::builder(client, config).build()
    }

    /// Make sure `key`'s resource set exists before a write targets it.
    ///
    /// Returns `Ok` only once the key is `Ready`. Every error is retryable
    /// and leaves the key absent from the cache.
    pub async fn ensure_provisioned(&self, key: &TenantKey) -> Result<(), ProvisionError> {
        let inner = &self.inner;
        ProvisioningMetrics::incr(&inner.metrics.ensure_calls);

        if inner.cache.get(key) == Some(ProvisioningState::Ready) {
            ProvisioningMetrics::incr(&inner.metrics.fast_path_hits);
            let alias_missing = match &inner.rollover {
                Some(rollover) if rollover.needs_check(key) => {
                    self.run_rollover(rollover, key).await == Some(RolloverOutcome::AliasMissing)
                }
                _ => false,
            };
            if !alias_missing {
                return Ok(());
            }
            // Write index is gone: demote and fall through to re-provision
            let previous = inner.recovery.invalidate(key);
            tracing::info!(
                tenant_key = %key,
                previous = ?previous,
                "Write alias lost its index, re-provisioning"
            );
        }

        match inner.cache.put_if_absent(key) {
            Ok(ticket) => self.provision_as_owner(key, ticket).await,
            Err(ProvisioningState::Ready) => Ok(()),
            Err(ProvisioningState::Initializing) => self.wait_for_ready(key).await,
        }
    }

    async fn provision_as_owner(
        &self,
        key: &TenantKey,
        ticket: OwnerTicket,
    ) -> Result<(), ProvisionError> {
        let inner = &self.inner;
        let guard = OwnerGuard::new(&inner.cache, key, ticket);
        let attempt_id = Uuid::now_v7();
        ProvisioningMetrics::incr(&inner.metrics.provisions_started);
        tracing::debug!(tenant_key = %key, %attempt_id, "Elected provisioning owner");

        match inner.provisioner.provision(key, attempt_id).await {
            Ok(report) => {
                ProvisioningMetrics::incr(&inner.metrics.provisions_succeeded);
                if !guard.complete() {
                    tracing::warn!(
                        tenant_key = %key,
                        %attempt_id,
                        "Key was invalidated during provisioning, next event re-checks"
                    );
                    return Ok(());
                }
                tracing::info!(
                    tenant_key = %key,
                    %attempt_id,
                    created = report.created().count(),
                    index = ?report.created_index,
                    "Provisioning complete"
                );

                if let Some(rollover) = &inner.rollover {
                    // A freshly created index is today's partition; a
                    // pre-existing one may be stale. A missing alias right
                    // after provisioning is left to the write path.
                    if report.created_index.is_some() {
                        rollover.record_checked(key);
                    } else {
                        self.run_rollover(rollover, key).await;
                    }
                }
                Ok(())
            }
            Err(err) => {
                guard.release();
                ProvisioningMetrics::incr(&inner.metrics.provisions_failed);
                let step = err.step().map(|s| s.as_str()).unwrap_or("unknown");
                if err.class() == ErrorClass::Permission {
                    tracing::error!(
                        tenant_key = %key,
                        %attempt_id,
                        step,
                        error = %err,
                        "Provisioning denied by remote store"
                    );
                } else {
                    tracing::warn!(
                        tenant_key = %key,
                        %attempt_id,
                        step,
                        error = %err,
                        "Provisioning failed, key released for retry"
                    );
                }
                Err(err)
            }
        }
    }

    async fn wait_for_ready(&self, key: &TenantKey) -> Result<(), ProvisionError> {
        let config = &self.inner.config;
        let started = Instant::now();

        for _ in 0..config.wait_max_attempts {
            tokio::time::sleep(config.wait_poll_interval).await;
            match self.inner.cache.get(key) {
                Some(ProvisioningState::Ready) => return Ok(()),
                Some(ProvisioningState::Initializing) => {}
                None => {
                    tracing::debug!(tenant_key = %key, "Provisioning owner gave up");
                    return Err(ProvisionError::Abandoned { key: key.clone() });
                }
            }
        }

        let waited = started.elapsed();
        ProvisioningMetrics::incr(&self.inner.metrics.waiter_timeouts);
        tracing::warn!(
            tenant_key = %key,
            waited_ms = waited.as_millis() as u64,
            attempts = config.wait_max_attempts,
            "Timed out waiting for provisioning owner"
        );
        Err(ProvisionError::WaitTimeout {
            key: key.clone(),
            waited,
        })
    }

    /// Run the daily check. Failures never fail the event; `None` means the
    /// check errored and a later event retries it.
    async fn run_rollover(
        &self,
        rollover: &DailyRolloverChecker,
        key: &TenantKey,
    ) -> Option<RolloverOutcome> {
        match rollover.check(key).await {
            Ok(outcome) => {
                if !matches!(
                    outcome,
                    RolloverOutcome::InFlightElsewhere | RolloverOutcome::Current
                ) {
                    tracing::debug!(tenant_key = %key, outcome = ?outcome, "Rollover check finished");
                }
                Some(outcome)
            }
            Err(err) => {
                tracing::warn!(
                    tenant_key = %key,
                    error = %err,
                    "Daily rollover failed, retrying on a later event"
                );
                None
            }
        }
    }

    /// Report a failed write targeting `key`'s resources.
    pub fn on_write_error(&self, key: &TenantKey, kind: WriteErrorKind) -> WriteDisposition {
        self.inner.recovery.on_write_error(key, kind)
    }

    pub fn state(&self, key: &TenantKey) -> Option<ProvisioningState> {
        self.inner.cache.get(key)
    }

    pub fn metrics(&self) -> ProvisioningSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn cache(&self) -> &ProvisioningCache {
        &self.inner.cache
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.inner.config
    }

    pub fn rollover_checker(&self) -> Option<&DailyRolloverChecker> {
        self.inner.rollover.as_deref()
    }

    /// Handler sharing this manager's cache, for write layers that only
    /// report errors.
    pub fn recovery_handler(&self) -> ErrorRecoveryHandler {
        self.inner.recovery.clone()
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for [`ProvisioningManager`].
pub struct ProvisioningManagerBuilder {
    client: Arc<dyn RemoteResourceClient>,
    config: ProvisioningConfig,
    clock: Arc<dyn Clock>,
    specs: Arc<dyn ResourceSpecBuilder>,
}

impl ProvisioningManagerBuilder {
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_spec_builder(mut self, specs: Arc<dyn ResourceSpecBuilder>) -> Self {
        self.specs = specs;
        self
    }

    pub fn build(self) -> Result<ProvisioningManager, ConfigError> {
        self.config.validate()?;

        let cache = Arc::new(ProvisioningCache::new());
        let metrics = Arc::new(ProvisioningMetrics::new());
        let rollover = self.config.rollover_active().then(|| {
            Arc::new(DailyRolloverChecker::new(
                Arc::clone(&self.client),
                Arc::clone(&self.clock),
                self.config.resource_prefix.clone(),
                Arc::clone(&metrics),
            ))
        });
        let recovery =
            ErrorRecoveryHandler::new(Arc::clone(&cache), rollover.clone(), Arc::clone(&metrics));
        let provisioner = ResourceProvisioner::new(
            self.client,
            self.specs,
            self.clock,
            self.config.resource_prefix.clone(),
            self.config.partitioning,
        );

        Ok(ProvisioningManager {
            inner: Arc::new(ManagerInner {
                cache,
                provisioner,
                rollover,
                recovery,
                metrics,
                config: self.config,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{Partitioning, ProvisionStep, RemoteError};
    use sluice_remote::FixedClock;
    use sluice_test_utils::{nginx_key, seed_resources, test_config, test_day, MockResourceClient, Op};
    use std::time::Duration;

    fn manager(client: &Arc<MockResourceClient>, config: ProvisioningConfig) -> ProvisioningManager {
        ProvisioningManager::builder(
            Arc::clone(client) as Arc<dyn RemoteResourceClient>,
            config,
        )
        .with_clock(Arc::new(FixedClock::new(test_day())))
        .build()
        .expect("test config is valid")
    }

    async fn wait_for_state(manager: &ProvisioningManager, state: ProvisioningState) {
        for _ in 0..200 {
            if manager.state(&nginx_key()) == Some(state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("key never reached {state}");
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let client: Arc<dyn RemoteResourceClient> = Arc::new(MockResourceClient::new());
        let config = test_config().with_wait(Duration::ZERO, 10);
        assert!(ProvisioningManager::new(client, config).is_err());
    }

    #[tokio::test]
    async fn test_first_call_provisions_then_fast_path() {
        let client = Arc::new(MockResourceClient::new());
        let manager = manager(&client, test_config());

        manager.ensure_provisioned(&nginx_key()).await.unwrap();
        assert_eq!(manager.state(&nginx_key()), Some(ProvisioningState::Ready));
        let after_first = client.total_calls();

        for _ in 0..10 {
            manager.ensure_provisioned(&nginx_key()).await.unwrap();
        }
        assert_eq!(client.total_calls(), after_first);

        let snapshot = manager.metrics();
        assert_eq!(snapshot.ensure_calls, 11);
        assert_eq!(snapshot.fast_path_hits, 10);
        assert_eq!(snapshot.provisions_started, 1);
        assert_eq!(snapshot.provisions_succeeded, 1);
    }

    #[tokio::test]
    async fn test_failure_releases_key_and_propagates() {
        let client = Arc::new(MockResourceClient::new());
        let manager = manager(&client, test_config());
        client.fail_times(
            Op::CreateIndex,
            RemoteError::Transport {
                reason: "connection reset".to_string(),
            },
            1,
        );

        let err = manager.ensure_provisioned(&nginx_key()).await.unwrap_err();
        assert_eq!(err.step(), Some(ProvisionStep::CreateIndexAndAlias));
        assert!(err.is_retryable());
        assert_eq!(manager.state(&nginx_key()), None);
        assert_eq!(manager.metrics().provisions_failed, 1);

        manager.ensure_provisioned(&nginx_key()).await.unwrap();
        assert_eq!(client.calls(Op::CreatePolicy), 1);
        assert_eq!(client.calls(Op::CreateTemplate), 1);
        assert_eq!(client.calls(Op::CreateIndex), 2);
    }

    #[tokio::test]
    async fn test_permission_failure_is_not_cached() {
        let client = Arc::new(MockResourceClient::new());
        let manager = manager(&client, test_config());
        client.fail_always(
            Op::CreatePolicy,
            RemoteError::PermissionDenied {
                resource: "logs-nginx-policy".to_string(),
                reason: "missing manage_ilm".to_string(),
            },
        );

        for _ in 0..3 {
            let err = manager.ensure_provisioned(&nginx_key()).await.unwrap_err();
            assert_eq!(err.class(), ErrorClass::Permission);
            assert_eq!(manager.state(&nginx_key()), None);
        }
        // Each call attempted once; nothing was treated as existing
        assert_eq!(client.calls(Op::CreatePolicy), 3);
        assert_eq!(client.calls(Op::CreateTemplate), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiter_times_out_when_owner_hangs() {
        let client = Arc::new(MockResourceClient::new());
        client.hang_on(Op::CreatePolicy);
        let config = test_config();
        let bound = config.wait_bound();
        let manager = manager(&client, config);

        let owner = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.ensure_provisioned(&nginx_key()).await })
        };
        wait_for_state(&manager, ProvisioningState::Initializing).await;

        let started = std::time::Instant::now();
        let err = manager.ensure_provisioned(&nginx_key()).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, ProvisionError::WaitTimeout { .. }));
        assert_eq!(err.class(), ErrorClass::Timeout);
        assert!(elapsed >= bound);
        assert!(elapsed < bound + Duration::from_secs(1));
        assert_eq!(manager.metrics().waiter_timeouts, 1);

        owner.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancelled_owner_releases_claim() {
        let client = Arc::new(MockResourceClient::new());
        client.hang_on(Op::CreateTemplate);
        let manager = manager(&client, test_config().with_wait(Duration::from_millis(10), 500));

        let owner = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.ensure_provisioned(&nginx_key()).await })
        };
        wait_for_state(&manager, ProvisioningState::Initializing).await;

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.ensure_provisioned(&nginx_key()).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        owner.abort();
        assert!(owner.await.unwrap_err().is_cancelled());
        assert_eq!(manager.state(&nginx_key()), None);

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, ProvisionError::Abandoned { .. }));

        // A later call re-provisions from scratch
        client.release_hangs();
        manager.ensure_provisioned(&nginx_key()).await.unwrap();
        assert_eq!(manager.state(&nginx_key()), Some(ProvisioningState::Ready));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_invalidation_during_provisioning_demotes_after_owner_finishes() {
        let client = Arc::new(MockResourceClient::new());
        client.hang_on(Op::CreateIndex);
        let manager = manager(&client, test_config().with_wait(Duration::from_millis(10), 500));

        let owner = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.ensure_provisioned(&nginx_key()).await })
        };
        for _ in 0..200 {
            if client.calls(Op::CreateIndex) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(client.calls(Op::CreateIndex), 1);

        assert_eq!(
            manager.on_write_error(&nginx_key(), WriteErrorKind::ResourceMissing),
            WriteDisposition::RetryAfterReprovision
        );
        assert_eq!(manager.state(&nginx_key()), Some(ProvisioningState::Initializing));

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.ensure_provisioned(&nginx_key()).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(client.calls(Op::PolicyExists), 1);
        assert_eq!(client.calls(Op::CreatePolicy), 1);

        client.release_hangs();
        assert!(owner.await.unwrap().is_ok());
        assert_eq!(manager.state(&nginx_key()), None);
        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, ProvisionError::Abandoned { .. }));

        // The next event re-checks everything and creates nothing new
        manager.ensure_provisioned(&nginx_key()).await.unwrap();
        assert_eq!(client.calls(Op::PolicyExists), 2);
        assert_eq!(client.calls(Op::WriteIndexExists), 2);
        assert_eq!(client.calls(Op::CreatePolicy), 1);
        assert_eq!(client.calls(Op::CreateTemplate), 1);
        assert_eq!(client.calls(Op::CreateIndex), 1);
        assert_eq!(manager.state(&nginx_key()), Some(ProvisioningState::Ready));
        assert_eq!(manager.metrics().provisions_started, 2);
    }

    #[tokio::test]
    async fn test_stale_preexisting_index_is_rolled_over_by_owner() {
        let client = Arc::new(MockResourceClient::new());
        let yesterday = test_day().pred_opt().unwrap();
        seed_resources(&client, &test_config(), &nginx_key(), yesterday)
            .await
            .unwrap();
        let manager = manager(&client, test_config());

        manager.ensure_provisioned(&nginx_key()).await.unwrap();
        assert_eq!(client.calls(Op::Rollover), 1);
        assert_eq!(manager.metrics().rollovers, 1);

        // Ready and checked today: the fast path stays silent
        let before = client.total_calls();
        manager.ensure_provisioned(&nginx_key()).await.unwrap();
        assert_eq!(client.total_calls(), before);
    }

    #[tokio::test]
    async fn test_sequence_partitioning_has_no_rollover() {
        let client = Arc::new(MockResourceClient::new());
        let manager = manager(
            &client,
            test_config().with_partitioning(Partitioning::Sequence),
        );
        assert!(manager.rollover_checker().is_none());

        manager.ensure_provisioned(&nginx_key()).await.unwrap();
        assert_eq!(client.calls(Op::ActiveWriteIndex), 0);
        assert_eq!(
            client.store().index_names().await,
            vec!["logs-nginx.000001".to_string()]
        );
    }

    #[tokio::test]
    async fn test_rollover_failure_does_not_fail_event() {
        let client = Arc::new(MockResourceClient::new());
        let clock = Arc::new(FixedClock::new(test_day()));
        let manager = ProvisioningManager::builder(
            Arc::clone(&client) as Arc<dyn RemoteResourceClient>,
            test_config(),
        )
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .build()
        .unwrap();

        manager.ensure_provisioned(&nginx_key()).await.unwrap();
        clock.advance_days(1);
        client.fail_always(
            Op::Rollover,
            RemoteError::Transport {
                reason: "timeout".to_string(),
            },
        );

        manager.ensure_provisioned(&nginx_key()).await.unwrap();
        assert_eq!(manager.metrics().rollover_failures, 1);
        assert_eq!(manager.state(&nginx_key()), Some(ProvisioningState::Ready));
    }
}
