//! Bodies of the three remote resources.
//!
//! Payload shapes belong to the remote store; the provisioner only passes
//! them through. The default builder embeds the cross-references that force
//! the creation order: template -> policy, index -> write alias.

use serde_json::{json, Value};
use sluice_core::ResourceNames;

/// Produces the opaque JSON bodies sent on creation.
pub trait ResourceSpecBuilder: Send + Sync {
    fn policy(&self, names: &ResourceNames) -> Value;
    fn template(&self, names: &ResourceNames) -> Value;
    fn index(&self, names: &ResourceNames) -> Value;
}

/// Minimal bodies: a hot/delete lifecycle, a template bound to the policy,
/// and an index that declares the write alias.
#[derive(Debug, Clone)]
pub struct DefaultSpecBuilder {
    /// Age after which partitions are deleted, e.g. "30d".
    pub retention: String,
}

impl Default for DefaultSpecBuilder {
    fn default() -> Self {
        Self {
            retention: "30d".to_string(),
        }
    }
}

impl ResourceSpecBuilder for DefaultSpecBuilder {
    fn policy(&self, _names: &ResourceNames) -> Value {
        json!({
            "policy": {
                "phases": {
                    "hot": { "actions": {} },
                    "delete": {
                        "min_age": self.retention,
                        "actions": { "delete": {} }
                    }
                }
            }
        })
    }

    fn template(&self, names: &ResourceNames) -> Value {
        json!({
            "index_patterns": [names.index_pattern],
            "template": {
                "settings": {
                    "index.lifecycle.name": names.policy,
                    "index.lifecycle.rollover_alias": names.write_alias
                }
            }
        })
    }

    fn index(&self, names: &ResourceNames) -> Value {
        json!({
            "aliases": {
                names.write_alias.clone(): { "is_write_index": true }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::TenantKey;

    #[test]
    fn test_template_references_policy_and_pattern() {
        let names = ResourceNames::for_key("logs", &TenantKey::new("nginx").unwrap());
        let body = DefaultSpecBuilder::default().template(&names);

        assert_eq!(body["index_patterns"][0], "logs-nginx.*");
        assert_eq!(
            body["template"]["settings"]["index.lifecycle.name"],
            "logs-nginx-policy"
        );
    }

    #[test]
    fn test_index_declares_write_alias() {
        let names = ResourceNames::for_key("logs", &TenantKey::new("nginx").unwrap());
        let body = DefaultSpecBuilder::default().index(&names);
        assert_eq!(body["aliases"]["logs-nginx"]["is_write_index"], true);
    }
}
