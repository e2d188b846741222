//! Property-Based Tests for Daily Rollover
//!
//! **Property 8: Once per key per day**
//!
//! For any `Ready` key and any number of days advanced, the write alias SHALL
//! be moved at most once per calendar day, AND it SHALL always point at the
//! current day's partition after the first event of that day.

use proptest::prelude::*;
use sluice_core::{Partitioning, ResourceNames};
use sluice_provision::ProvisioningState;
use sluice_remote::RemoteResourceClient;
use sluice_test_utils::{arb_tenant_key, nginx_key, test_config, Op};
use tokio::runtime::{Builder, Runtime};

#[path = "support/harness.rs"]
mod harness;
use harness::{default_harness, manager_with_mock};

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_rollover_at_most_once_per_day(
        key in arb_tenant_key(),
        days in 1u64..5,
        events_per_day in 1usize..12,
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = default_harness();
            let names = ResourceNames::for_key("logs", &key);

            for day in 0..=days {
                if day > 0 {
                    h.clock.advance_days(1);
                }
                let handles: Vec<_> = (0..events_per_day)
                    .map(|_| {
                        let manager = h.manager.clone();
                        let key = key.clone();
                        tokio::spawn(async move { manager.ensure_provisioned(&key).await })
                    })
                    .collect();
                for handle in handles {
                    let result = handle
                        .await
                        .map_err(|e| TestCaseError::fail(format!("task panicked: {}", e)))?;
                    prop_assert!(result.is_ok());
                }

                // A concurrent caller may skip the in-flight check; one more
                // event after the burst always sees the finished check.
                prop_assert!(h.manager.ensure_provisioned(&key).await.is_ok());

                let active = h
                    .client
                    .store()
                    .active_write_index(&names.write_alias)
                    .await
                    .map_err(|e| TestCaseError::fail(format!("alias lookup failed: {}", e)))?;
                let today = h
                    .manager
                    .rollover_checker()
                    .and_then(|checker| checker.last_checked(&key));
                prop_assert_eq!(today, Some(sluice_test_utils::test_day() + chrono::Days::new(day)));
                prop_assert_eq!(active, today.map(|d| names.daily_index(d)));
            }

            prop_assert_eq!(h.client.calls(Op::Rollover), days as usize);
            prop_assert_eq!(h.manager.metrics().rollovers, days);
            prop_assert_eq!(h.manager.state(&key), Some(ProvisioningState::Ready));
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn test_rollover_disabled_never_checks() {
    let h = manager_with_mock(test_config().with_rollover(false));
    h.manager.ensure_provisioned(&nginx_key()).await.unwrap();

    h.clock.advance_days(3);
    h.manager.ensure_provisioned(&nginx_key()).await.unwrap();

    assert!(h.manager.rollover_checker().is_none());
    assert_eq!(h.client.calls(Op::ActiveWriteIndex), 0);
    assert_eq!(h.client.calls(Op::Rollover), 0);
}

#[tokio::test]
async fn test_invalidation_forgets_rollover_record() {
    let h = manager_with_mock(test_config().with_partitioning(Partitioning::Daily));
    h.manager.ensure_provisioned(&nginx_key()).await.unwrap();
    let checker = h.manager.rollover_checker().unwrap();
    assert!(!checker.needs_check(&nginx_key()));

    h.manager
        .on_write_error(&nginx_key(), sluice_core::WriteErrorKind::ResourceMissing);
    assert!(checker.needs_check(&nginx_key()));
    assert_eq!(checker.last_checked(&nginx_key()), None);
}
