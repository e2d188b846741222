//! Sluice Provision - Single-Flight Resource Provisioning
//!
//! Guarantees each tenant key's remote resource set (lifecycle policy,
//! index template, initial index with write alias) exists before the first
//! write targets it, with exactly one remote creation sequence per key per
//! provisioning cycle regardless of how many workers race.
//!
//! - [`ProvisioningManager`]: fast path, owner election and bounded waiting
//! - [`BatchDeduplicator`]: one check per distinct key per batch
//! - [`ErrorRecoveryHandler`]: invalidation when a write target disappears
//! - [`DailyRolloverChecker`]: once-per-day move to a new daily partition

pub mod batch;
pub mod cache;
pub mod manager;
pub mod metrics;
pub mod provisioner;
pub mod recovery;
pub mod rollover;
pub mod telemetry;

pub use batch::{distinct_keys, BatchDeduplicator, BatchReport, KeyResolver};
pub use cache::{CacheEntry, OwnerTicket, ProvisioningCache};
pub use manager::{ProvisioningManager, ProvisioningManagerBuilder};
pub use metrics::{ProvisioningMetrics, ProvisioningSnapshot};
pub use provisioner::{ProvisionReport, ResourceProvisioner, StepOutcome};
pub use recovery::ErrorRecoveryHandler;
pub use rollover::{DailyRolloverChecker, RolloverOutcome};
pub use telemetry::init_tracing;

pub use sluice_core::{
    ProvisionError, ProvisioningConfig, ProvisioningState, TenantKey, WriteDisposition,
    WriteErrorKind,
};
