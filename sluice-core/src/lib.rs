//! Sluice Core - Provisioning Types
//!
//! Pure data structures shared by every sluice crate: tenant keys, the
//! per-key provisioning state, derived resource names, write-error
//! classification, configuration and the error taxonomy.
//! This crate performs no I/O.

pub mod config;
pub mod error;
pub mod key;
pub mod names;
pub mod state;
pub mod write_error;

pub use config::{Partitioning, ProvisioningConfig, TelemetryConfig, LogFormat};
pub use error::{
    ConfigError, ErrorClass, ProvisionError, RemoteError, RemoteResult, SluiceError,
    SluiceResult,
};
pub use key::{KeyError, TenantKey};
pub use names::ResourceNames;
pub use state::{ProvisionStep, ProvisioningState};
pub use write_error::{WriteDisposition, WriteErrorKind};
