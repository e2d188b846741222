//! Provisioning cache: the only shared mutable state of the manager.
//!
//! One [`DashMap`] entry per tenant key. Every operation touches a single
//! key, so contention on one tenant never blocks another (DashMap shards
//! its locks). The read path is a shard read lock and a copy of a small
//! enum; nothing on it calls out to the remote store.
//!
//! Ownership of an `Initializing` entry is represented by an
//! [`OwnerTicket`]. Only the holder of the ticket can promote or release
//! the entry it claimed. Invalidating an `Initializing` entry flags the
//! claim instead of removing it: the key stays owned until the current
//! owner finishes, and the owner's success then demotes the key to absent
//! rather than `Ready`.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sluice_core::{ProvisioningState, TenantKey};
use std::sync::atomic::{AtomicU64, Ordering};

/// Proof of ownership of one `Initializing` claim.
///
/// Not `Clone`: exactly one owner exists per claim.
#[derive(Debug, PartialEq, Eq)]
pub struct OwnerTicket {
    generation: u64,
}

impl OwnerTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Cached state of one tenant key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub state: ProvisioningState,
    /// Claim this entry belongs to.
    pub generation: u64,
    /// When the entry entered its current state.
    pub since: DateTime<Utc>,
    /// Set when the key was invalidated while its owner was still working.
    pub invalidated: bool,
}

/// Concurrent key -> state map.
///
/// Constructed explicitly and owned by the provisioning manager; there is
/// no process-wide instance.
#[derive(Debug, Default)]
pub struct ProvisioningCache {
    entries: DashMap<TenantKey, CacheEntry>,
    next_generation: AtomicU64,
}

impl ProvisioningCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of `key`; `None` means absent.
    pub fn get(&self, key: &TenantKey) -> Option<ProvisioningState> {
        self.entries.get(key).map(|entry| entry.state)
    }

    /// Full entry of `key`, for diagnostics.
    pub fn entry(&self, key: &TenantKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// Insert `Initializing` for `key` unless an entry already exists.
    ///
    /// This is the only mutual-exclusion primitive: `Ok` means the caller is
    /// now the owner; `Err` carries the state that was already there.
    pub fn put_if_absent(&self, key: &TenantKey) -> Result<OwnerTicket, ProvisioningState> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(existing) => Err(existing.get().state),
            Entry::Vacant(vacant) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
                vacant.insert(CacheEntry {
                    state: ProvisioningState::Initializing,
                    generation,
                    since: Utc::now(),
                    invalidated: false,
                });
                Ok(OwnerTicket { generation })
            }
        }
    }

    /// Promote the owner's claim to `Ready`.
    ///
    /// Returns false if the claim is not `ticket`'s, or if it was invalidated
    /// while the owner was working. An invalidated claim is removed so the
    /// next caller re-checks the remote store.
    pub fn mark_ready(&self, key: &TenantKey, ticket: &OwnerTicket) -> bool {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.generation != ticket.generation
                    || entry.state != ProvisioningState::Initializing
                {
                    return false;
                }
                if entry.invalidated {
                    occupied.remove();
                    return false;
                }
                entry.state = ProvisioningState::Ready;
                entry.since = Utc::now();
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Drop the owner's claim after a failed or abandoned attempt.
    ///
    /// Only removes the entry if it is still the claim `ticket` was issued
    /// for.
    pub fn release(&self, key: &TenantKey, ticket: &OwnerTicket) -> bool {
        self.entries
            .remove_if(key, |_, entry| {
                entry.generation == ticket.generation
                    && entry.state == ProvisioningState::Initializing
            })
            .is_some()
    }

    /// Demote `key` after its resources were found missing.
    ///
    /// `Ready` becomes absent. An `Initializing` claim keeps its owner and is
    /// flagged, so no second owner can be elected while the first is still
    /// running. Returns the state the key was in.
    pub fn invalidate(&self, key: &TenantKey) -> Option<ProvisioningState> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let state = occupied.get().state;
                match state {
                    ProvisioningState::Ready => {
                        occupied.remove();
                    }
                    ProvisioningState::Initializing => occupied.get_mut().invalidated = true,
                }
                Some(state)
            }
            Entry::Vacant(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries currently in `state`.
    pub fn count_in(&self, state: ProvisioningState) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.state == state)
            .count()
    }
}
