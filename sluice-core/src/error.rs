//! Error types for sluice operations

use crate::{KeyError, ProvisionStep, TenantKey};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by the remote resource client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The resource already exists. Creation is idempotent, so callers
    /// treat this as success.
    #[error("Resource already exists: {resource}")]
    Conflict { resource: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Permission denied on {resource}: {reason}")]
    PermissionDenied { resource: String, reason: String },

    /// Network failure or remote-side timeout. Safe to retry.
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Request rejected with status {status}: {reason}")]
    Rejected { status: u16, reason: String },
}

impl RemoteError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Conflict { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transport { .. })
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, RemoteError::PermissionDenied { .. })
    }
}

/// Result type alias for remote client calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Coarse classification of a provisioning failure, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Transient,
    Permission,
    Rejected,
    Timeout,
}

/// Errors raised by `ensure_provisioned`.
///
/// None of these are cached: the key is absent again by the time the
/// caller sees the error, so the next event re-attempts provisioning.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("Provisioning step {step} failed for tenant {key}: {source}")]
    StepFailed {
        key: TenantKey,
        step: ProvisionStep,
        #[source]
        source: RemoteError,
    },

    #[error("Timed out after {waited:?} waiting for tenant {key} to be provisioned")]
    WaitTimeout { key: TenantKey, waited: Duration },

    #[error("Provisioning of tenant {key} was abandoned by its owner")]
    Abandoned { key: TenantKey },
}

impl ProvisionError {
    pub fn key(&self) -> &TenantKey {
        match self {
            ProvisionError::StepFailed { key, .. }
            | ProvisionError::WaitTimeout { key, .. }
            | ProvisionError::Abandoned { key } => key,
        }
    }

    /// Step that failed, if the error came from a remote call.
    pub fn step(&self) -> Option<ProvisionStep> {
        match self {
            ProvisionError::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Every provisioning failure leaves the key absent, so the triggering
    /// write may always be retried.
    pub fn is_retryable(&self) -> bool {
        true
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ProvisionError::StepFailed { source, .. } => match source {
                RemoteError::PermissionDenied { .. } => ErrorClass::Permission,
                RemoteError::Rejected { .. } => ErrorClass::Rejected,
                _ => ErrorClass::Transient,
            },
            ProvisionError::WaitTimeout { .. } => ErrorClass::Timeout,
            ProvisionError::Abandoned { .. } => ErrorClass::Transient,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Telemetry initialisation failed: {reason}")]
    Telemetry { reason: String },
}

/// Master error type for all sluice errors.
#[derive(Debug, Clone, Error)]
pub enum SluiceError {
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Provision error: {0}")]
    Provision(#[from] ProvisionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for sluice operations.
pub type SluiceResult<T> = Result<T, SluiceError>;

// =============================================================================
// TESTS
// =============================================================================
