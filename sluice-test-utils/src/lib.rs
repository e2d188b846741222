//! Sluice Test Utilities
//!
//! Centralized test infrastructure for the sluice workspace:
//! - A call-counting, fault-injecting mock remote client
//! - Proptest generators for tenant keys and event batches
//! - Fixtures for common scenarios

pub use sluice_core::{
    Partitioning, ProvisionError, ProvisionStep, ProvisioningConfig, ProvisioningState,
    RemoteError, RemoteResult, ResourceNames, TenantKey, WriteDisposition, WriteErrorKind,
};
pub use sluice_remote::{FixedClock, InMemoryResourceClient, RemoteResourceClient};

use async_trait::async_trait;
use chrono::NaiveDate;
use proptest::prelude::*;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// MOCK REMOTE CLIENT
// ============================================================================

/// Remote operations the mock counts and can fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    PolicyExists,
    CreatePolicy,
    TemplateExists,
    CreateTemplate,
    WriteIndexExists,
    CreateIndex,
    ActiveWriteIndex,
    Rollover,
}

impl Op {
    pub const ALL: [Op; 8] = [
        Op::PolicyExists,
        Op::CreatePolicy,
        Op::TemplateExists,
        Op::CreateTemplate,
        Op::WriteIndexExists,
        Op::CreateIndex,
        Op::ActiveWriteIndex,
        Op::Rollover,
    ];

    fn slot(self) -> usize {
        match self {
            Op::PolicyExists => 0,
            Op::CreatePolicy => 1,
            Op::TemplateExists => 2,
            Op::CreateTemplate => 3,
            Op::WriteIndexExists => 4,
            Op::CreateIndex => 5,
            Op::ActiveWriteIndex => 6,
            Op::Rollover => 7,
        }
    }
}

#[derive(Debug, Clone)]
struct Fault {
    error: RemoteError,
    /// `None` fails forever.
    remaining: Option<usize>,
}

/// Mock remote client backed by [`InMemoryResourceClient`].
///
/// Every call is counted per [`Op`] before any injected behaviour applies,
/// so tests can assert exact call counts even for failing or hanging calls.
#[derive(Debug, Default)]
pub struct MockResourceClient {
    store: InMemoryResourceClient,
    counts: [AtomicUsize; 8],
    faults: Mutex<HashMap<Op, Fault>>,
    hangs: Mutex<HashSet<Op>>,
    released: Notify,
    latency: Mutex<Option<Duration>>,
}

impl MockResourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a delay to every call, widening race windows in concurrency tests.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap_or_else(|err| err.into_inner()) = Some(latency);
        self
    }

    /// The backing store, for seeding and out-of-band deletion.
    pub fn store(&self) -> &InMemoryResourceClient {
        &self.store
    }

    pub fn calls(&self, op: Op) -> usize {
        self.counts[op.slot()].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        Op::ALL.iter().map(|op| self.calls(*op)).sum()
    }

    pub fn reset_counts(&self) {
        for count in &self.counts {
            count.store(0, Ordering::SeqCst);
        }
    }

    /// Fail the next `times` calls of `op` with `error`.
    pub fn fail_times(&self, op: Op, error: RemoteError, times: usize) {
        self.faults
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .insert(
                op,
                Fault {
                    error,
                    remaining: Some(times),
                },
            );
    }

    /// Fail every call of `op` with `error` until cleared.
    pub fn fail_always(&self, op: Op, error: RemoteError) {
        self.faults
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .insert(
                op,
                Fault {
                    error,
                    remaining: None,
                },
            );
    }

    pub fn clear_faults(&self) {
        self.faults
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clear();
    }

    /// Make every call of `op` hang until [`Self::release_hangs`].
    pub fn hang_on(&self, op: Op) {
        self.hangs
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .insert(op);
    }

    /// Stop hanging, and let calls already parked continue.
    pub fn release_hangs(&self) {
        self.hangs
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clear();
        self.released.notify_waiters();
    }

    fn is_hung(&self, op: Op) -> bool {
        self.hangs
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .contains(&op)
    }

    async fn enter(&self, op: Op) -> RemoteResult<()> {
        self.counts[op.slot()].fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        loop {
            // Register before checking so a release in between is not missed
            let released = self.released.notified();
            if !self.is_hung(op) {
                break;
            }
            released.await;
        }

        let mut faults = self.faults.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(fault) = faults.get_mut(&op) {
            let error = fault.error.clone();
            match fault.remaining {
                Some(0) => {
                    faults.remove(&op);
                }
                Some(n) => {
                    fault.remaining = Some(n - 1);
                    if n == 1 {
                        faults.remove(&op);
                    }
                    return Err(error);
                }
                None => return Err(error),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteResourceClient for MockResourceClient {
    async fn policy_exists(&self, name: &str) -> RemoteResult<bool> {
        self.enter(Op::PolicyExists).await?;
        self.store.policy_exists(name).await
    }

    async fn create_policy(&self, name: &str, spec: &Value) -> RemoteResult<()> {
        self.enter(Op::CreatePolicy).await?;
        self.store.create_policy(name, spec).await
    }

    async fn template_exists(&self, name: &str) -> RemoteResult<bool> {
        self.enter(Op::TemplateExists).await?;
        self.store.template_exists(name).await
    }

    async fn create_template(&self, name: &str, spec: &Value) -> RemoteResult<()> {
        self.enter(Op::CreateTemplate).await?;
        self.store.create_template(name, spec).await
    }

    async fn write_index_exists(&self, alias: &str) -> RemoteResult<bool> {
        self.enter(Op::WriteIndexExists).await?;
        self.store.write_index_exists(alias).await
    }

    async fn create_index_with_write_alias(
        &self,
        index: &str,
        alias: &str,
        spec: &Value,
    ) -> RemoteResult<()> {
        self.enter(Op::CreateIndex).await?;
        self.store
            .create_index_with_write_alias(index, alias, spec)
            .await
    }

    async fn active_write_index(&self, alias: &str) -> RemoteResult<Option<String>> {
        self.enter(Op::ActiveWriteIndex).await?;
        self.store.active_write_index(alias).await
    }

    async fn rollover(&self, alias: &str, new_index: &str) -> RemoteResult<String> {
        self.enter(Op::Rollover).await?;
        self.store.rollover(alias, new_index).await
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Minimal log event: the service name is the tenant key source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEvent {
    pub service: Option<String>,
    pub message: String,
}

impl TestEvent {
    pub fn new(service: &str, message: &str) -> Self {
        Self {
            service: Some(service.to_string()),
            message: message.to_string(),
        }
    }

    pub fn unkeyed(message: &str) -> Self {
        Self {
            service: None,
            message: message.to_string(),
        }
    }
}

/// Resolver reading the tenant key from `TestEvent::service`.
pub fn resolve_service(event: &TestEvent) -> Option<TenantKey> {
    event
        .service
        .as_deref()
        .and_then(|s| TenantKey::new(s).ok())
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Generate a valid tenant key.
pub fn arb_tenant_key() -> impl Strategy<Value = TenantKey> {
    "[a-z][a-z0-9-]{0,15}".prop_filter_map("tenant key must be non-empty", |s| {
        TenantKey::new(s).ok()
    })
}

/// Generate a batch of events drawn from a small pool of services, with
/// some events carrying no service at all.
pub fn arb_batch(max_services: usize, max_events: usize) -> impl Strategy<Value = Vec<TestEvent>> {
    let services = prop::collection::vec("[a-z]{1,8}", 1..=max_services.max(1));
    services.prop_flat_map(move |pool| {
        let pool_len = pool.len();
        prop::collection::vec(
            (prop::option::weighted(0.9, 0..pool_len), "[a-z ]{0,20}"),
            0..=max_events,
        )
        .prop_map(move |picks| {
            picks
                .into_iter()
                .map(|(pick, message)| TestEvent {
                    service: pick.map(|i| pool[i].clone()),
                    message,
                })
                .collect()
        })
    })
}

// ============================================================================
// FIXTURES
// ============================================================================

/// The tenant used throughout the end-to-end scenarios.
pub fn nginx_key() -> TenantKey {
    TenantKey::new("nginx").expect("literal key is non-empty")
}

/// A fixed calendar day for daily-partition tests.
pub fn test_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid calendar date")
}

/// Configuration with a short waiter bound (20 x 10ms).
pub fn test_config() -> ProvisioningConfig {
    ProvisioningConfig::default()
        .with_prefix("logs")
        .with_wait(Duration::from_millis(10), 20)
}

/// Mark all three resources of `key` as already existing.
pub async fn seed_resources(
    client: &MockResourceClient,
    config: &ProvisioningConfig,
    key: &TenantKey,
    day: NaiveDate,
) -> RemoteResult<()> {
    let names = ResourceNames::for_key(&config.resource_prefix, key);
    let store = client.store();
    store.create_policy(&names.policy, &Value::Null).await?;
    store.create_template(&names.template, &Value::Null).await?;
    store
        .create_index_with_write_alias(
            &names.initial_index(config.partitioning, day),
            &names.write_alias,
            &Value::Null,
        )
        .await
}
