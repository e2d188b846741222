//! Remote resource client trait.

use ::async_trait::async_trait;
use serde_json::Value;
use sluice_core::RemoteResult;

/// Capability set the provisioner calls on the remote store.
///
/// Every `create_*` call is idempotent from the provisioner's point of
/// view: implementations report an already-existing resource as
/// [`sluice_core::RemoteError::Conflict`], which callers treat as success.
/// Request-level timeouts are the implementation's responsibility.
#[async_trait]
pub trait RemoteResourceClient: Send + Sync {
    // ========================================================================
    // POLICY
    // ========================================================================

    /// Check whether a lifecycle policy exists.
    async fn policy_exists(&self, name: &str) -> RemoteResult<bool>;

    /// Create a lifecycle policy.
    async fn create_policy(&self, name: &str, spec: &Value) -> RemoteResult<()>;

    // ========================================================================
    // TEMPLATE
    // ========================================================================

    /// Check whether an index template exists.
    async fn template_exists(&self, name: &str) -> RemoteResult<bool>;

    /// Create an index template.
    async fn create_template(&self, name: &str, spec: &Value) -> RemoteResult<()>;

    // ========================================================================
    // WRITE INDEX
    // ========================================================================

    /// Check whether the write alias resolves to an existing index.
    async fn write_index_exists(&self, alias: &str) -> RemoteResult<bool>;

    /// Create a physical index and point `alias` at it as the write index.
    async fn create_index_with_write_alias(
        &self,
        index: &str,
        alias: &str,
        spec: &Value,
    ) -> RemoteResult<()>;

    /// Name of the physical index `alias` currently writes to, if any.
    async fn active_write_index(&self, alias: &str) -> RemoteResult<Option<String>>;

    /// Create `new_index` and atomically repoint the write alias to it.
    ///
    /// Returns the name of the index that is the write index afterwards.
    async fn rollover(&self, alias: &str, new_index: &str) -> RemoteResult<String>;
}
