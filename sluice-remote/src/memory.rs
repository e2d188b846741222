//! In-memory remote store.
//!
//! Behaves like the real store for everything the provisioner relies on:
//! creation of an existing resource is a `Conflict`, aliases resolve to a
//! single write index, and resources can be deleted out-of-band.

use ::async_trait::async_trait;
use serde_json::Value;
use sluice_core::{RemoteError, RemoteResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::RemoteResourceClient;

#[derive(Debug, Default)]
struct Store {
    policies: HashMap<String, Value>,
    templates: HashMap<String, Value>,
    indices: HashMap<String, Value>,
    /// alias -> current write index
    aliases: HashMap<String, String>,
}

/// Remote store held entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryResourceClient {
    store: RwLock<Store>,
}

impl InMemoryResourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete a physical index, dropping any alias that pointed at it.
    pub async fn delete_index(&self, index: &str) -> bool {
        let mut store = self.store.write().await;
        let existed = store.indices.remove(index).is_some();
        store.aliases.retain(|_, target| target != index);
        existed
    }

    pub async fn delete_policy(&self, name: &str) -> bool {
        self.store.write().await.policies.remove(name).is_some()
    }

    pub async fn delete_template(&self, name: &str) -> bool {
        self.store.write().await.templates.remove(name).is_some()
    }

    pub async fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.store.read().await.indices.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn template_body(&self, name: &str) -> Option<Value> {
        self.store.read().await.templates.get(name).cloned()
    }
}

#[async_trait]
impl RemoteResourceClient for InMemoryResourceClient {
    async fn policy_exists(&self, name: &str) -> RemoteResult<bool> {
        Ok(self.store.read().await.policies.contains_key(name))
    }

    async fn create_policy(&self, name: &str, spec: &Value) -> RemoteResult<()> {
        let mut store = self.store.write().await;
        if store.policies.contains_key(name) {
            return Err(RemoteError::Conflict {
                resource: name.to_string(),
            });
        }
        store.policies.insert(name.to_string(), spec.clone());
        Ok(())
    }

    async fn template_exists(&self, name: &str) -> RemoteResult<bool> {
        Ok(self.store.read().await.templates.contains_key(name))
    }

    async fn create_template(&self, name: &str, spec: &Value) -> RemoteResult<()> {
        let mut store = self.store.write().await;
        if store.templates.contains_key(name) {
            return Err(RemoteError::Conflict {
                resource: name.to_string(),
            });
        }
        store.templates.insert(name.to_string(), spec.clone());
        Ok(())
    }

    async fn write_index_exists(&self, alias: &str) -> RemoteResult<bool> {
        let store = self.store.read().await;
        Ok(store
            .aliases
            .get(alias)
            .is_some_and(|index| store.indices.contains_key(index)))
    }

    async fn create_index_with_write_alias(
        &self,
        index: &str,
        alias: &str,
        spec: &Value,
    ) -> RemoteResult<()> {
        let mut store = self.store.write().await;
        if store.indices.contains_key(index) {
            return Err(RemoteError::Conflict {
                resource: index.to_string(),
            });
        }
        store.indices.insert(index.to_string(), spec.clone());
        store.aliases.insert(alias.to_string(), index.to_string());
        Ok(())
    }

    async fn active_write_index(&self, alias: &str) -> RemoteResult<Option<String>> {
        Ok(self.store.read().await.aliases.get(alias).cloned())
    }

    async fn rollover(&self, alias: &str, new_index: &str) -> RemoteResult<String> {
        let mut store = self.store.write().await;
        let current = store
            .aliases
            .get(alias)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                resource: alias.to_string(),
            })?;
        if current == new_index {
            return Ok(current);
        }
        let body = store.indices.get(&current).cloned().unwrap_or(Value::Null);
        store.indices.entry(new_index.to_string()).or_insert(body);
        store.aliases.insert(alias.to_string(), new_index.to_string());
        Ok(new_index.to_string())
    }
}
