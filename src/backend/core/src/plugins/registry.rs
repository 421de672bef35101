//! The thread-safe in-memory index of loaded plugins, keyed by id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::Plugin;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("plugin {0:?} is already registered")]
    AlreadyRegistered(String),

    #[error("plugin {0:?} is not registered")]
    NotFound(String),
}

/// A concurrent, reader-friendly map of plugin id to [`Plugin`].
///
/// Registration uses a write lock; lookups and listing take a read lock and
/// return owned clones, so callers never hold the lock across `.await`
/// points of their own.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    plugins: Arc<RwLock<HashMap<String, Plugin>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `plugin` under its id, replacing whatever was registered there.
    pub async fn register(&self, plugin: Plugin) {
        let mut guard = self.plugins.write().await;
        debug!(plugin_id = %plugin.id, version = %plugin.version, "registering plugin");
        guard.insert(plugin.id.clone(), plugin);
    }

    /// Add `plugin` under its id. Errors if the id is already present —
    /// callers that want replace-semantics should use `register`.
    pub async fn register_strict(&self, plugin: Plugin) -> Result<(), RegistryError> {
        let mut guard = self.plugins.write().await;
        if guard.contains_key(&plugin.id) {
            return Err(RegistryError::AlreadyRegistered(plugin.id));
        }
        debug!(plugin_id = %plugin.id, version = %plugin.version, "registering plugin (strict)");
        guard.insert(plugin.id.clone(), plugin);
        Ok(())
    }

    pub async fn unregister(&self, id: &str) -> Result<Plugin, RegistryError> {
        let mut guard = self.plugins.write().await;
        let removed = guard.remove(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        info!(plugin_id = %id, "unregistered plugin");
        Ok(removed)
    }

    pub async fn get(&self, id: &str) -> Option<Plugin> {
        self.plugins.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.plugins.read().await.contains_key(id)
    }

    /// A snapshot of every currently-registered plugin, in arbitrary order.
    pub async fn list(&self) -> Vec<Plugin> {
        self.plugins.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.plugins.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plugins.read().await.is_empty()
    }

    pub async fn clear(&self) {
        let mut guard = self.plugins.write().await;
        let count = guard.len();
        guard.clear();
        info!(count, "cleared registry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{MatchBlock, MatchRule, OutputBlock, PluginMetadata, PluginType, Trigger, Value};

    fn plugin(id: &str) -> Plugin {
        Plugin {
            id: id.to_string(),
            name: "Test Plugin".into(),
            version: "1.0.0".into(),
            plugin_type: PluginType::Evaluation,
            author: "test".into(),
            min_runtime_version: None,
            metadata: PluginMetadata {
                severity: "low".into(),
                tags: vec![],
                references: vec![],
                cve: None,
            },
            triggers: vec![Trigger {
                data_key: "k".into(),
                condition: "exists".into(),
                value: Value::Bool(true),
            }],
            match_block: Some(MatchBlock {
                logic: "AND".into(),
                rules: vec![MatchRule {
                    field: "k".into(),
                    operator: "equals".into(),
                    value: Value::String("v".into()),
                }],
            }),
            output: OutputBlock {
                message: "finding".into(),
                ..Default::default()
            },
            signature: None,
            file_path: None,
            loaded_at: None,
        }
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let registry = Registry::new();
        registry.register(plugin("a")).await;
        let fetched = registry.get("a").await.unwrap();
        assert_eq!(fetched.id, "a");
    }

    #[tokio::test]
    async fn register_replaces_existing() {
        let registry = Registry::new();
        registry.register(plugin("a")).await;
        let mut updated = plugin("a");
        updated.version = "2.0.0".into();
        registry.register(updated).await;
        assert_eq!(registry.get("a").await.unwrap().version, "2.0.0");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn register_strict_errors_on_duplicate() {
        let registry = Registry::new();
        registry.register_strict(plugin("a")).await.unwrap();
        assert!(matches!(
            registry.register_strict(plugin("a")).await,
            Err(RegistryError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn unregister_missing_errors() {
        let registry = Registry::new();
        assert!(matches!(registry.unregister("missing").await, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_returns_all_registered() {
        let registry = Registry::new();
        registry.register(plugin("a")).await;
        registry.register(plugin("b")).await;
        let mut ids: Vec<String> = registry.list().await.into_iter().map(|p| p.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn clear_empties_the_registry() {
        let registry = Registry::new();
        registry.register(plugin("a")).await;
        registry.clear().await;
        assert!(registry.is_empty().await);
    }
}
