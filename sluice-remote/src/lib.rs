//! Sluice Remote - Resource Client Seam
//!
//! Defines the capability set the provisioner needs from the remote store
//! (existence checks, idempotent creation, rollover), the builder for the
//! opaque resource bodies, and the clock used for daily partitions.
//! The HTTP implementation lives outside this workspace; an in-memory
//! client is provided for local runs and tests.

pub mod client;
pub mod clock;
pub mod memory;
pub mod spec_builder;

pub use client::RemoteResourceClient;
pub use clock::{Clock, FixedClock, SystemClock};
pub use memory::InMemoryResourceClient;
pub use spec_builder::{DefaultSpecBuilder, ResourceSpecBuilder};
