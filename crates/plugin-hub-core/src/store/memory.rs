//! In-memory stores

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::{ReentrantMutex, RwLock};

use crate::error::{PluginHubError, Result};
use crate::plugin::types::{InstalledPlugin, PluginOption};
use crate::store::{InstalledPluginStore, OptionStore, StoreGuard};

/// Both stores backed by process-local maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    plugins: RwLock<HashMap<String, InstalledPlugin>>,
    options: RwLock<HashMap<(String, String), PluginOption>>,
    writers: ReentrantMutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstalledPluginStore for MemoryStore {
    fn write_guard(&self) -> Result<StoreGuard<'_>> {
        Ok(StoreGuard::new(self.writers.lock()))
    }

    fn find(&self, plugin_id: &str) -> Result<Option<InstalledPlugin>> {
        Ok(self.plugins.read().get(plugin_id).cloned())
    }

    fn list(&self) -> Result<Vec<InstalledPlugin>> {
        let mut plugins: Vec<_> = self.plugins.read().values().cloned().collect();
        plugins.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plugins)
    }

    fn insert(&self, plugin: InstalledPlugin) -> Result<InstalledPlugin> {
        let mut plugins = self.plugins.write();
        if plugins.contains_key(&plugin.plugin_id) {
            return Err(PluginHubError::AlreadyInstalled {
                id: plugin.plugin_id,
            });
        }
        plugins.insert(plugin.plugin_id.clone(), plugin.clone());
        Ok(plugin)
    }

    fn save(&self, plugin: &InstalledPlugin) -> Result<()> {
        let mut plugins = self.plugins.write();
        match plugins.get_mut(&plugin.plugin_id) {
            Some(existing) => {
                *existing = plugin.clone();
                Ok(())
            }
            None => Err(PluginHubError::NotInstalled {
                id: plugin.plugin_id.clone(),
            }),
        }
    }

    fn delete(&self, plugin_id: &str) -> Result<bool> {
        Ok(self.plugins.write().remove(plugin_id).is_some())
    }
}

impl OptionStore for MemoryStore {
    fn get(&self, plugin_id: &str, name: &str) -> Result<Option<PluginOption>> {
        let key = (plugin_id.to_string(), name.to_string());
        Ok(self.options.read().get(&key).cloned())
    }

    fn upsert(&self, plugin_id: &str, name: &str, value: &str) -> Result<PluginOption> {
        let now = Utc::now();
        let mut options = self.options.write();
        let option = options
            .entry((plugin_id.to_string(), name.to_string()))
            .and_modify(|opt| {
                opt.value = value.to_string();
                opt.updated_at = now;
            })
            .or_insert_with(|| PluginOption {
                plugin_id: plugin_id.to_string(),
                name: name.to_string(),
                value: value.to_string(),
                created_at: now,
                updated_at: now,
            });
        Ok(option.clone())
    }

    fn list_options(&self) -> Result<Vec<PluginOption>> {
        let mut options: Vec<_> = self.options.read().values().cloned().collect();
        options.sort_by(|a, b| (&a.plugin_id, &a.name).cmp(&(&b.plugin_id, &b.name)));
        Ok(options)
    }
}
