//! Classification of write-stage failures.
//!
//! Only one narrow signal counts as "the provisioned resource is gone": the
//! remote's `index_not_found_exception` error type. Status codes alone are
//! never enough, and error text is never pattern-matched.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote error type reported when a write targets a missing index.
pub const INDEX_NOT_FOUND_ERROR_TYPE: &str = "index_not_found_exception";

/// Remote error type reported for authorization failures.
pub const SECURITY_ERROR_TYPE: &str = "security_exception";

/// Classification of a failed write, as reported by the bulk layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteErrorKind {
    /// The write target no longer exists (deleted out-of-band).
    ResourceMissing,
    PermissionDenied,
    MalformedPayload,
    /// Throttling or remote-side unavailability.
    Transient,
    Other,
}

impl WriteErrorKind {
    /// Classify a bulk item failure from its HTTP status and error type.
    pub fn classify(status: u16, error_type: Option<&str>) -> Self {
        match (status, error_type) {
            (_, Some(INDEX_NOT_FOUND_ERROR_TYPE)) => WriteErrorKind::ResourceMissing,
            (_, Some(SECURITY_ERROR_TYPE)) | (401 | 403, _) => WriteErrorKind::PermissionDenied,
            (429, _) | (500..=599, _) => WriteErrorKind::Transient,
            (400, _) => WriteErrorKind::MalformedPayload,
            _ => WriteErrorKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WriteErrorKind::ResourceMissing => "resource_missing",
            WriteErrorKind::PermissionDenied => "permission_denied",
            WriteErrorKind::MalformedPayload => "malformed_payload",
            WriteErrorKind::Transient => "transient",
            WriteErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for WriteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the write layer should do after reporting a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    /// The key was invalidated; retry the write, it will re-provision first.
    RetryAfterReprovision,
    /// Provisioning state was left alone; apply the write layer's own policy.
    Unchanged,
}
