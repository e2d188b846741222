//! Provisioning states and steps.
//!
//! ```text
//! (absent) ── claim ──→ Initializing ── mark_ready ──→ Ready
//!    ↑                        │                          │
//!    └──────── remove ────────┴───────── remove ─────────┘
//! ```
//!
//! `Absent` is never stored: it is the lack of a cache entry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stored state of a tenant key in the provisioning cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisioningState {
    /// An owner is creating the tenant's resources.
    Initializing,
    /// Policy, template and write index are all confirmed to exist.
    Ready,
}

impl ProvisioningState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningState::Initializing => "initializing",
            ProvisioningState::Ready => "ready",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ProvisioningState::Ready)
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote step of a provisioning attempt, in execution order.
///
/// Later steps reference earlier resources by name, so the order is fixed:
/// policy, then template, then the write index with its alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProvisionStep {
    CreatePolicy,
    CreateTemplate,
    CreateIndexAndAlias,
    /// Daily partition rollover; not part of the creation sequence.
    Rollover,
}

impl ProvisionStep {
    /// The creation sequence, in order.
    pub const SEQUENCE: [ProvisionStep; 3] = [
        ProvisionStep::CreatePolicy,
        ProvisionStep::CreateTemplate,
        ProvisionStep::CreateIndexAndAlias,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionStep::CreatePolicy => "create_policy",
            ProvisionStep::CreateTemplate => "create_template",
            ProvisionStep::CreateIndexAndAlias => "create_index_and_alias",
            ProvisionStep::Rollover => "rollover",
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
