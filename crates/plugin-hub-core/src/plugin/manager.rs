//! Plugin Manager
//!
//! High-level API driving install/upgrade/uninstall/update transitions.
//! Every transition holds the plugin id's lock, and the installed store's
//! write guard, from precondition check to final write. The store guard is
//! what keeps separate processes sharing one data directory apart.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::{Config, PluginConfig};
use crate::error::{PluginHubError, Result};
use crate::plugin::cache::RegistryCache;
use crate::plugin::catalog::{ListQuery, PluginCatalog, PluginDetail, PluginListing};
use crate::plugin::cook::cook;
use crate::plugin::fetcher::{HttpFetcher, RegistrySource};
use crate::plugin::locks::KeyedLocks;
use crate::plugin::types::{
    CookedPlugin, EnabledPlugin, InstalledPlugin, PluginOption, RegistryItem, RegistrySnapshot,
    OPTION_CLIENT_OPTIONS, OPTION_OPTIONS_SCHEMA, REGISTRY_SENTINEL_ID,
};
use crate::plugin::version;
use crate::store::{InstalledPluginStore, JsonFileStore, OptionStore};

/// Body of a plugin update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginUpdate {
    pub enabled: bool,
    /// Client options JSON; `None` or empty leaves the stored value alone
    #[serde(default)]
    pub client_options: Option<String>,
}

/// Plugin Manager - lifecycle orchestration over the stores and registry
pub struct PluginManager {
    installed: Arc<dyn InstalledPluginStore>,
    options: Arc<dyn OptionStore>,
    source: Arc<dyn RegistrySource>,
    cache: RegistryCache,
    catalog: PluginCatalog,
    settings: PluginConfig,
    locks: KeyedLocks,
}

impl PluginManager {
    pub fn new(
        installed: Arc<dyn InstalledPluginStore>,
        options: Arc<dyn OptionStore>,
        source: Arc<dyn RegistrySource>,
        settings: PluginConfig,
    ) -> Self {
        let cache = RegistryCache::new(options.clone());
        let catalog = PluginCatalog::new(
            installed.clone(),
            options.clone(),
            settings.app_version.clone(),
        );

        Self {
            installed,
            options,
            source,
            cache,
            catalog,
            settings,
            locks: KeyedLocks::new(),
        }
    }

    /// Open the file-backed stores and HTTP fetcher under `base_dir`
    pub fn open(base_dir: &Path) -> Result<Self> {
        let config = Config::load(base_dir)?;
        let store = Arc::new(JsonFileStore::new(base_dir));
        let fetcher = Arc::new(HttpFetcher::new(config.plugin.fetch_timeout())?);

        Ok(Self::new(store.clone(), store, fetcher, config.plugin))
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &PluginConfig {
        &self.settings
    }

    // ========== Queries ==========

    pub fn list(&self, query: &ListQuery) -> Result<PluginListing> {
        self.catalog.list(query)
    }

    pub fn get(&self, plugin_id: &str) -> Result<PluginDetail> {
        self.catalog.get(plugin_id)
    }

    /// Cached registry snapshot
    pub fn registry(&self) -> Result<RegistrySnapshot> {
        self.cache.get()
    }

    /// Source/integrity/type of every enabled plugin, for the comment widget
    pub fn enabled_plugins(&self) -> Result<Vec<EnabledPlugin>> {
        if !self.settings.enabled {
            return Ok(Vec::new());
        }

        let mut installed = self.installed.list()?;
        installed.reverse();

        Ok(installed
            .into_iter()
            .filter(|p| p.enabled)
            .map(|p| EnabledPlugin {
                source: p.source,
                integrity: p.integrity,
                kind: p.kind,
            })
            .collect())
    }

    /// Option rows left behind by uninstalled plugins; reported, never deleted
    pub fn orphaned_options(&self) -> Result<Vec<PluginOption>> {
        let installed: HashSet<String> = self
            .installed
            .list()?
            .into_iter()
            .map(|p| p.plugin_id)
            .collect();

        Ok(self
            .options
            .list_options()?
            .into_iter()
            .filter(|opt| opt.plugin_id != REGISTRY_SENTINEL_ID)
            .filter(|opt| !installed.contains(&opt.plugin_id))
            .collect())
    }

    // ========== Registry ==========

    /// Fetch the remote registry and replace the cached snapshot
    pub fn refresh_registry(&self) -> Result<RegistrySnapshot> {
        let _guard = self.locks.lock(REGISTRY_SENTINEL_ID);

        let snapshot = self.source.fetch_registry(&self.settings.registry_url)?;
        self.cache.put(&snapshot)?;

        tracing::info!(
            plugins = snapshot.plugins.len(),
            themes = snapshot.themes.len(),
            "plugin registry updated"
        );
        Ok(snapshot)
    }

    // ========== Lifecycle ==========

    /// Install a plugin from the cached registry, enabled
    pub fn install(&self, plugin_id: &str) -> Result<InstalledPlugin> {
        let _guard = self.locks.lock(plugin_id);

        let item = self.registry_item(plugin_id)?;
        let plugin = {
            let _store = self.installed.write_guard()?;
            if self.installed.find(plugin_id)?.is_some() {
                return Err(PluginHubError::AlreadyInstalled {
                    id: plugin_id.to_string(),
                });
            }
            self.installed.insert(InstalledPlugin::from_registry(&item))?
        };
        tracing::info!(plugin = %plugin_id, version = %plugin.version, "plugin installed");

        self.refresh_options_schema(&item);
        Ok(plugin)
    }

    /// Move an installed plugin to the registry's newer version
    pub fn upgrade(&self, plugin_id: &str) -> Result<InstalledPlugin> {
        let _guard = self.locks.lock(plugin_id);

        let store = self.installed.write_guard()?;
        let mut plugin = self.require_installed(plugin_id)?;
        let item = self.registry_item(plugin_id)?;

        if !version::is_newer(&item.version, &plugin.version)? {
            return Err(PluginHubError::NoNewVersion {
                id: plugin_id.to_string(),
                installed: plugin.version,
                available: item.version,
            });
        }

        let previous = std::mem::replace(&mut plugin.version, item.version.clone());
        plugin.source = item.source.clone();
        plugin.integrity = item.integrity.clone();
        plugin.updated_at = Utc::now();
        self.installed.save(&plugin)?;
        drop(store);

        tracing::info!(
            plugin = %plugin_id,
            from = %previous,
            to = %plugin.version,
            "plugin upgraded"
        );

        self.refresh_options_schema(&item);
        Ok(plugin)
    }

    /// Remove the installed record; its option rows stay
    pub fn uninstall(&self, plugin_id: &str) -> Result<()> {
        let _guard = self.locks.lock(plugin_id);
        let _store = self.installed.write_guard()?;

        if !self.installed.delete(plugin_id)? {
            return Err(PluginHubError::NotInstalled {
                id: plugin_id.to_string(),
            });
        }

        tracing::info!(plugin = %plugin_id, "plugin uninstalled");
        Ok(())
    }

    /// Set the enabled flag and optionally replace the client options
    pub fn update(&self, plugin_id: &str, update: &PluginUpdate) -> Result<CookedPlugin> {
        let _guard = self.locks.lock(plugin_id);

        let store = self.installed.write_guard()?;
        let mut plugin = self.require_installed(plugin_id)?;

        let client_options = update
            .client_options
            .as_deref()
            .filter(|raw| !raw.is_empty());
        if let Some(raw) = client_options {
            validate_json(raw)?;
            // options first: a failed upsert leaves the record untouched
            self.options
                .upsert(plugin_id, OPTION_CLIENT_OPTIONS, raw)?;
        }

        plugin.enabled = update.enabled;
        plugin.updated_at = Utc::now();
        self.installed.save(&plugin)?;
        drop(store);

        tracing::info!(
            plugin = %plugin_id,
            enabled = plugin.enabled,
            client_options = client_options.is_some(),
            "plugin updated"
        );

        let registry = self.cache.get()?;
        Ok(cook(
            registry.find(plugin_id),
            Some(&plugin),
            &self.settings.app_version,
        ))
    }

    // ========== Helpers ==========

    fn registry_item(&self, plugin_id: &str) -> Result<RegistryItem> {
        self.cache
            .get()?
            .find(plugin_id)
            .cloned()
            .ok_or_else(|| PluginHubError::NotFound {
                id: plugin_id.to_string(),
            })
    }

    fn require_installed(&self, plugin_id: &str) -> Result<InstalledPlugin> {
        self.installed
            .find(plugin_id)?
            .ok_or_else(|| PluginHubError::NotInstalled {
                id: plugin_id.to_string(),
            })
    }

    /// Best-effort schema download; failures are logged, never returned
    fn refresh_options_schema(&self, item: &RegistryItem) {
        let url = item.options_schema.trim();
        if url.is_empty() {
            return;
        }

        let result = self
            .source
            .fetch_options_schema(url)
            .and_then(|schema| {
                self.options
                    .upsert(&item.id, OPTION_OPTIONS_SCHEMA, &schema)
            });

        if let Err(err) = result {
            tracing::error!(plugin = %item.id, %url, "failed to refresh options schema: {err}");
        }
    }
}

fn validate_json(raw: &str) -> Result<()> {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(|_| ())
        .map_err(|e| PluginHubError::InvalidJson {
            field: OPTION_CLIENT_OPTIONS.to_string(),
            message: e.to_string(),
        })
}
