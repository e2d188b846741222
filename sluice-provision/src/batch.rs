//! Per-batch deduplication of provisioning checks.
//!
//! A batch of M events sharing D distinct tenant keys results in at most D
//! calls to [`ProvisioningManager::ensure_provisioned`]. Events keep their own
//! routing afterwards; only the number of checks changes.

use futures_util::future::join_all;
use sluice_core::{ProvisionError, TenantKey};
use std::collections::{HashMap, HashSet};

use crate::manager::ProvisioningManager;

/// Resolves the tenant key of an event.
///
/// `None` means the event has no key: it is written without provisioning,
/// and no key is invented for it.
pub trait KeyResolver<E: ?Sized>: Send + Sync {
    fn resolve_key(&self, event: &E) -> Option<TenantKey>;
}

impl<E: ?Sized, F> KeyResolver<E> for F
where
    F: Fn(&E) -> Option<TenantKey> + Send + Sync,
{
    fn resolve_key(&self, event: &E) -> Option<TenantKey> {
        self(event)
    }
}

/// Distinct keys of `events` in first-seen order, plus the number of events
/// without a key.
pub fn distinct_keys<E, R>(events: &[E], resolver: &R) -> (Vec<TenantKey>, usize)
where
    R: KeyResolver<E> + ?Sized,
{
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    let mut unkeyed = 0;
    for event in events {
        match resolver.resolve_key(event) {
            Some(key) => {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            None => unkeyed += 1,
        }
    }
    (keys, unkeyed)
}

/// Result of checking one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Distinct keys in first-seen order.
    pub keys: Vec<TenantKey>,
    pub outcomes: HashMap<TenantKey, Result<(), ProvisionError>>,
    /// Events that resolved to no key.
    pub unkeyed: usize,
    /// Total events in the batch.
    pub events: usize,
}

impl BatchReport {
    pub fn outcome_for(&self, key: &TenantKey) -> Option<&Result<(), ProvisionError>> {
        self.outcomes.get(key)
    }

    pub fn distinct_keys(&self) -> usize {
        self.keys.len()
    }

    /// Keys whose check failed, in first-seen order.
    pub fn failures(&self) -> impl Iterator<Item = (&TenantKey, &ProvisionError)> + '_ {
        self.keys.iter().filter_map(|key| match self.outcomes.get(key) {
            Some(Err(err)) => Some((key, err)),
            _ => None,
        })
    }

    pub fn is_all_ready(&self) -> bool {
        self.outcomes.values().all(Result::is_ok)
    }
}

/// Front of the provisioning manager for batched pipelines.
#[derive(Debug, Clone)]
pub struct BatchDeduplicator {
    manager: ProvisioningManager,
}

impl BatchDeduplicator {
    pub fn new(manager: ProvisioningManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ProvisioningManager {
        &self.manager
    }

    /// Check every distinct key of `events` once, concurrently.
    ///
    /// One key's failure never aborts the batch; it is recorded in the report
    /// and the write layer decides what to do with that key's events.
    pub async fn ensure_batch<E, R>(&self, events: &[E], resolver: &R) -> BatchReport
    where
        R: KeyResolver<E> + ?Sized,
    {
        let (keys, unkeyed) = distinct_keys(events, resolver);

        let results = join_all(
            keys.iter()
                .map(|key| async move { (key.clone(), self.manager.ensure_provisioned(key).await) }),
        )
        .await;

        let report = BatchReport {
            outcomes: results.into_iter().collect(),
            keys,
            unkeyed,
            events: events.len(),
        };

        let failed = report.failures().count();
        if failed > 0 {
            tracing::warn!(
                events = report.events,
                distinct_keys = report.distinct_keys(),
                failed,
                "Batch has keys that failed provisioning"
            );
        } else {
            tracing::trace!(
                events = report.events,
                distinct_keys = report.distinct_keys(),
                unkeyed,
                "Batch provisioning check complete"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::RemoteError;
    use sluice_remote::{FixedClock, RemoteResourceClient};
    use sluice_test_utils::{resolve_service, test_config, test_day, MockResourceClient, Op, TestEvent};
    use std::sync::Arc;

    fn deduplicator(client: &Arc<MockResourceClient>) -> BatchDeduplicator {
        let manager = ProvisioningManager::builder(
            Arc::clone(client) as Arc<dyn RemoteResourceClient>,
            test_config(),
        )
        .with_clock(Arc::new(FixedClock::new(test_day())))
        .build()
        .unwrap();
        BatchDeduplicator::new(manager)
    }

    fn key(name: &str) -> TenantKey {
        TenantKey::new(name).unwrap()
    }

    #[test]
    fn test_distinct_keys_keeps_first_seen_order() {
        let events = vec![
            TestEvent::new("nginx", "a"),
            TestEvent::new("redis", "b"),
            TestEvent::unkeyed("c"),
            TestEvent::new("nginx", "d"),
            TestEvent::new("api", "e"),
        ];
        let (keys, unkeyed) = distinct_keys(&events, &resolve_service);
        assert_eq!(keys, vec![key("nginx"), key("redis"), key("api")]);
        assert_eq!(unkeyed, 1);
    }

    #[test]
    fn test_closure_resolver() {
        let events = vec!["nginx", "", "nginx"];
        let (keys, unkeyed) = distinct_keys(&events, &|e: &&str| TenantKey::new(*e).ok());
        assert_eq!(keys, vec![key("nginx")]);
        assert_eq!(unkeyed, 1);
    }

    #[tokio::test]
    async fn test_batch_checks_each_key_once() {
        let client = Arc::new(MockResourceClient::new());
        let dedup = deduplicator(&client);
        let events: Vec<_> = (0..50)
            .map(|i| TestEvent::new(if i % 2 == 0 { "nginx" } else { "redis" }, "line"))
            .collect();

        let report = dedup.ensure_batch(&events, &resolve_service).await;

        assert!(report.is_all_ready());
        assert_eq!(report.events, 50);
        assert_eq!(report.distinct_keys(), 2);
        assert_eq!(dedup.manager().metrics().ensure_calls, 2);
        assert_eq!(client.calls(Op::CreatePolicy), 2);
    }

    #[tokio::test]
    async fn test_one_failing_key_does_not_abort_batch() {
        let client = Arc::new(MockResourceClient::new());
        let dedup = deduplicator(&client);
        client.fail_times(
            Op::PolicyExists,
            RemoteError::PermissionDenied {
                resource: "policy".to_string(),
                reason: "denied".to_string(),
            },
            1,
        );
        let events = vec![TestEvent::new("nginx", "a"), TestEvent::new("nginx", "b")];

        let report = dedup.ensure_batch(&events, &resolve_service).await;
        assert!(!report.is_all_ready());
        assert_eq!(report.failures().count(), 1);
        assert!(report.outcome_for(&key("nginx")).unwrap().is_err());

        // Next batch retries the key
        let report = dedup.ensure_batch(&events, &resolve_service).await;
        assert!(report.is_all_ready());
    }

    #[tokio::test]
    async fn test_unkeyed_events_skip_provisioning() {
        let client = Arc::new(MockResourceClient::new());
        let dedup = deduplicator(&client);
        let events = vec![TestEvent::unkeyed("a"), TestEvent::unkeyed("b")];

        let report = dedup.ensure_batch(&events, &resolve_service).await;
        assert_eq!(report.unkeyed, 2);
        assert_eq!(report.distinct_keys(), 0);
        assert!(report.is_all_ready());
        assert_eq!(client.total_calls(), 0);
    }
}
