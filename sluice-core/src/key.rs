//! Tenant key identifying one isolated resource set.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error returned when a tenant key cannot be constructed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Tenant key must not be empty")]
    Empty,
}

/// Immutable identifier of a tenant's resource set.
///
/// Usually a service or container name resolved from an event. The key is
/// stored in canonical form: lowercase, with every character outside
/// `[a-z0-9_-]` replaced by `_`. Two inputs that would derive the same
/// remote resource names are therefore the same key, and share one cache
/// entry. Cloning is a reference-count bump.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantKey(Arc<str>);

impl TenantKey {
    /// Create a tenant key. Empty and whitespace-only input is rejected:
    /// a missing key must be reported as absence by the resolver.
    pub fn new(value: impl AsRef<str>) -> Result<Self, KeyError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(Self(Arc::from(canonicalize(value))))
    }

    /// Borrow the canonical key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Remote resource names are lowercase and restricted in charset.
fn canonicalize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl fmt::Debug for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantKey({:?})", &*self.0)
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TenantKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TenantKey {
    type Error = KeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantKey> for String {
    fn from(key: TenantKey) -> Self {
        key.0.to_string()
    }
}
