//! Registry Cache
//!
//! Keeps the last fetched registry snapshot as a single option row under
//! the reserved sentinel id.

use std::sync::Arc;

use crate::error::{PluginHubError, Result};
use crate::plugin::types::{RegistrySnapshot, OPTION_REGISTRY_DATA, REGISTRY_SENTINEL_ID};
use crate::store::OptionStore;

/// Singleton cache entry for the remote registry
#[derive(Clone)]
pub struct RegistryCache {
    options: Arc<dyn OptionStore>,
}

impl RegistryCache {
    pub fn new(options: Arc<dyn OptionStore>) -> Self {
        Self { options }
    }

    /// Replace the cached snapshot in one upsert
    pub fn put(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        let value = serde_json::to_string(snapshot).map_err(PluginHubError::persistence)?;
        self.options
            .upsert(REGISTRY_SENTINEL_ID, OPTION_REGISTRY_DATA, &value)?;

        tracing::debug!(
            plugins = snapshot.plugins.len(),
            themes = snapshot.themes.len(),
            "registry cache updated"
        );
        Ok(())
    }

    /// Last cached snapshot; empty when nothing was fetched yet or the row is unreadable
    pub fn get(&self) -> Result<RegistrySnapshot> {
        let value = self
            .options
            .value(REGISTRY_SENTINEL_ID, OPTION_REGISTRY_DATA)?;

        if value.trim().is_empty() {
            return Ok(RegistrySnapshot::default());
        }

        match serde_json::from_str(&value) {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                tracing::warn!("cached registry data is malformed, treating as empty: {err}");
                Ok(RegistrySnapshot::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::types::RegistryItem;
    use crate::store::MemoryStore;

    fn snapshot() -> RegistrySnapshot {
        RegistrySnapshot {
            plugins: vec![RegistryItem {
                id: "katex".to_string(),
                name: "KaTeX".to_string(),
                version: "1.0.0".to_string(),
                ..Default::default()
            }],
            themes: Vec::new(),
        }
    }

    #[test]
    fn test_empty_before_first_put() {
        let cache = RegistryCache::new(Arc::new(MemoryStore::new()));
        assert!(cache.get().unwrap().is_empty());
    }

    #[test]
    fn test_put_replaces_single_row() {
        let store = Arc::new(MemoryStore::new());
        let cache = RegistryCache::new(store.clone());

        cache.put(&snapshot()).unwrap();
        cache.put(&RegistrySnapshot::default()).unwrap();
        cache.put(&snapshot()).unwrap();

        assert_eq!(cache.get().unwrap(), snapshot());
        assert_eq!(store.list_options().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_value_reads_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert(REGISTRY_SENTINEL_ID, OPTION_REGISTRY_DATA, "{broken")
            .unwrap();

        let cache = RegistryCache::new(store);
        assert!(cache.get().unwrap().is_empty());
    }
}
