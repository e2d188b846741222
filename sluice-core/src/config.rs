//! Configuration types
//!
//! Values are loaded from environment variables with defaults suited to
//! production. Unparseable values fall back to the default rather than
//! failing startup; `validate()` catches values that parse but make no sense.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// DEFAULTS
// ============================================================================

/// Default prefix for every remote resource name.
pub const DEFAULT_RESOURCE_PREFIX: &str = "logs";

/// Default interval between waiter polls (milliseconds).
pub const DEFAULT_WAIT_POLL_INTERVAL_MS: u64 = 100;

/// Default number of waiter polls (50 x 100ms = 5s bound).
pub const DEFAULT_WAIT_MAX_ATTEMPTS: u32 = 50;

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

// ============================================================================
// PARTITIONING
// ============================================================================

/// How physical indices behind a write alias are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partitioning {
    /// `<alias>.000001`, advanced by the remote's own lifecycle policy.
    Sequence,
    /// `<alias>.YYYY.MM.DD`, one partition per calendar day.
    Daily,
}

impl Partitioning {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partitioning::Sequence => "sequence",
            Partitioning::Daily => "daily",
        }
    }
}

impl FromStr for Partitioning {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequence" => Ok(Partitioning::Sequence),
            "daily" => Ok(Partitioning::Daily),
            _ => Err(ConfigError::InvalidValue {
                field: "partitioning".to_string(),
                value: s.to_string(),
                reason: "expected 'sequence' or 'daily'".to_string(),
            }),
        }
    }
}

// ============================================================================
// PROVISIONING CONFIGURATION
// ============================================================================

/// Configuration for the provisioning manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Prefix of every remote resource name (lowercase).
    pub resource_prefix: String,

    /// How long a waiter sleeps between polls of the cache.
    pub wait_poll_interval: Duration,

    /// How many times a waiter polls before giving up.
    pub wait_max_attempts: u32,

    /// Physical index naming strategy.
    pub partitioning: Partitioning,

    /// Whether the daily rollover check runs on the fast path.
    /// Ignored unless `partitioning` is `Daily`.
    pub rollover_enabled: bool,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            resource_prefix: DEFAULT_RESOURCE_PREFIX.to_string(),
            wait_poll_interval: Duration::from_millis(DEFAULT_WAIT_POLL_INTERVAL_MS),
            wait_max_attempts: DEFAULT_WAIT_MAX_ATTEMPTS,
            partitioning: Partitioning::Daily,
            rollover_enabled: true,
        }
    }
}

impl ProvisioningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create ProvisioningConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SLUICE_RESOURCE_PREFIX`: Resource name prefix (default: "logs")
    /// - `SLUICE_WAIT_POLL_INTERVAL_MS`: Waiter poll interval (default: 100)
    /// - `SLUICE_WAIT_MAX_ATTEMPTS`: Waiter poll count (default: 50)
    /// - `SLUICE_PARTITIONING`: "sequence" or "daily" (default: daily)
    /// - `SLUICE_ROLLOVER_ENABLED`: "true" or "false" (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let resource_prefix = lookup("SLUICE_RESOURCE_PREFIX")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.resource_prefix);

        let wait_poll_interval = lookup("SLUICE_WAIT_POLL_INTERVAL_MS")
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.wait_poll_interval);

        let wait_max_attempts = lookup("SLUICE_WAIT_MAX_ATTEMPTS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.wait_max_attempts);

        let partitioning = lookup("SLUICE_PARTITIONING")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.partitioning);

        let rollover_enabled = lookup("SLUICE_ROLLOVER_ENABLED")
            .map(|s| s.trim().to_lowercase() != "false")
            .unwrap_or(defaults.rollover_enabled);

        Self {
            resource_prefix,
            wait_poll_interval,
            wait_max_attempts,
            partitioning,
            rollover_enabled,
        }
    }

    /// Short waiter bound for local development and tests.
    pub fn development() -> Self {
        Self {
            resource_prefix: "dev-logs".to_string(),
            wait_poll_interval: Duration::from_millis(10),
            wait_max_attempts: 50,
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.resource_prefix = prefix.into();
        self
    }

    pub fn with_wait(mut self, poll_interval: Duration, max_attempts: u32) -> Self {
        self.wait_poll_interval = poll_interval;
        self.wait_max_attempts = max_attempts;
        self
    }

    pub fn with_partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }

    pub fn with_rollover(mut self, enabled: bool) -> Self {
        self.rollover_enabled = enabled;
        self
    }

    /// Worst-case time a waiter spends before raising a timeout.
    pub fn wait_bound(&self) -> Duration {
        self.wait_poll_interval.saturating_mul(self.wait_max_attempts)
    }

    /// Whether the daily rollover check is active.
    pub fn rollover_active(&self) -> bool {
        self.rollover_enabled && self.partitioning == Partitioning::Daily
    }

    /// Reject values that would break naming or the waiter bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.resource_prefix;
        let prefix_ok = !prefix.is_empty()
            && prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !prefix_ok {
            return Err(ConfigError::InvalidValue {
                field: "resource_prefix".to_string(),
                value: prefix.clone(),
                reason: "must be non-empty lowercase [a-z0-9_-]".to_string(),
            });
        }
        if self.wait_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "wait_poll_interval".to_string(),
                value: format!("{:?}", self.wait_poll_interval),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.wait_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "wait_max_attempts".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// TELEMETRY CONFIGURATION
// ============================================================================

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    Plain,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, e.g. "info,sluice_provision=debug".
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            format: LogFormat::Plain,
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `SLUICE_LOG`: filter directive (default: "info")
    /// - `SLUICE_LOG_FORMAT`: "json" or "plain" (default: plain)
    pub fn from_env() -> Self {
        let filter = std::env::var("SLUICE_LOG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let format = match std::env::var("SLUICE_LOG_FORMAT") {
            Ok(s) if s.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Plain,
        };
        Self { filter, format }
    }
}
