//! Plugin Catalog
//!
//! Builds the merged, filtered and sorted listing of every known plugin and
//! theme, plus the per-plugin detail view.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::plugin::cache::RegistryCache;
use crate::plugin::cook::cook;
use crate::plugin::types::{
    CookedPlugin, InstalledPlugin, PluginKind, RegistryItem, RegistrySnapshot,
    OPTION_CLIENT_OPTIONS, OPTION_OPTIONS_SCHEMA,
};
use crate::store::{InstalledPluginStore, OptionStore};

/// Listing filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    /// Case-insensitive name substring or exact id
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub only_installed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginListing {
    pub plugins: Vec<CookedPlugin>,
    pub themes: Vec<CookedPlugin>,
    pub plugins_count: usize,
    pub themes_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDetail {
    pub enabled: bool,
    /// Client options JSON, empty when unset or not installed
    pub client_options: String,
    /// Options schema JSON, empty when unset or not installed
    pub options_schema: String,
    pub plugin: CookedPlugin,
}

/// Read-side service over the registry cache and both stores
#[derive(Clone)]
pub struct PluginCatalog {
    installed: Arc<dyn InstalledPluginStore>,
    options: Arc<dyn OptionStore>,
    cache: RegistryCache,
    app_version: String,
}

impl PluginCatalog {
    pub fn new(
        installed: Arc<dyn InstalledPluginStore>,
        options: Arc<dyn OptionStore>,
        app_version: impl Into<String>,
    ) -> Self {
        let cache = RegistryCache::new(options.clone());
        Self {
            installed,
            options,
            cache,
            app_version: app_version.into(),
        }
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    /// List plugins and themes
    pub fn list(&self, query: &ListQuery) -> Result<PluginListing> {
        let installed = self.installed.list()?;
        let registry = self.cache.get()?;
        Ok(build_listing(&registry, &installed, query, &self.app_version))
    }

    /// Detail view of one plugin id; unknown ids yield a zero view
    pub fn get(&self, plugin_id: &str) -> Result<PluginDetail> {
        let installed = self.installed.find(plugin_id)?;
        let registry = self.cache.get()?;

        let (client_options, options_schema) = match &installed {
            Some(_) => (
                self.options.value(plugin_id, OPTION_CLIENT_OPTIONS)?,
                self.options.value(plugin_id, OPTION_OPTIONS_SCHEMA)?,
            ),
            None => (String::new(), String::new()),
        };

        let plugin = cook(
            registry.find(plugin_id),
            installed.as_ref(),
            &self.app_version,
        );

        Ok(PluginDetail {
            enabled: installed.as_ref().map(|p| p.enabled).unwrap_or(false),
            client_options,
            options_schema,
            plugin,
        })
    }
}

/// Merge, extend, filter and sort; pure so it can be tested without stores.
///
/// Installed records missing from the registry are appended only to the list
/// matching their stored kind (not to both lists), so an id never appears
/// twice across `plugins` and `themes`.
pub fn build_listing(
    registry: &RegistrySnapshot,
    installed: &[InstalledPlugin],
    query: &ListQuery,
    app_version: &str,
) -> PluginListing {
    let mut plugins = merge_with_installed(&registry.plugins, installed, app_version);
    let mut themes = merge_with_installed(&registry.themes, installed, app_version);

    extend_out_of_registry(&mut plugins, installed, PluginKind::Plugin, registry);
    extend_out_of_registry(&mut themes, installed, PluginKind::Theme, registry);

    for list in [&mut plugins, &mut themes] {
        list.retain(|p| matches_query(p, query));
        // stable: equal names keep their merge order
        list.sort_by(|a, b| a.name().cmp(b.name()));
    }

    PluginListing {
        plugins_count: plugins.len(),
        themes_count: themes.len(),
        plugins,
        themes,
    }
}

fn merge_with_installed(
    items: &[RegistryItem],
    installed: &[InstalledPlugin],
    app_version: &str,
) -> Vec<CookedPlugin> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.id.as_str()))
        .map(|item| {
            let local = installed.iter().find(|p| p.plugin_id == item.id);
            cook(Some(item), local, app_version)
        })
        .collect()
}

/// Append installed records missing from the list.
///
/// An orphan lands in the list matching its stored kind, and only if the id
/// is absent from the whole registry snapshot; a registry entry always wins.
fn extend_out_of_registry(
    list: &mut Vec<CookedPlugin>,
    installed: &[InstalledPlugin],
    kind: PluginKind,
    registry: &RegistrySnapshot,
) {
    let mut ids: HashSet<String> = list.iter().map(|p| p.id().to_string()).collect();

    for local in installed.iter().filter(|p| p.kind == kind) {
        if registry.find(&local.plugin_id).is_some() || ids.contains(&local.plugin_id) {
            continue;
        }
        ids.insert(local.plugin_id.clone());
        list.push(cook(None, Some(local), ""));
    }
}

fn matches_query(plugin: &CookedPlugin, query: &ListQuery) -> bool {
    if query.only_installed && !plugin.installed {
        return false;
    }

    // the term is used as given; whitespace is significant
    match query.search.as_deref() {
        Some(term) if !term.is_empty() => {
            let term = term.to_lowercase();
            plugin.name().to_lowercase().contains(&term) || plugin.id().to_lowercase() == term
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn item(id: &str, name: &str, kind: PluginKind, version: &str) -> RegistryItem {
        RegistryItem {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            version: version.to_string(),
            ..Default::default()
        }
    }

    fn local(id: &str, name: &str, kind: PluginKind, version: &str) -> InstalledPlugin {
        InstalledPlugin::from_registry(&item(id, name, kind, version))
    }

    fn registry() -> RegistrySnapshot {
        RegistrySnapshot {
            plugins: vec![
                item("katex", "KaTeX", PluginKind::Plugin, "1.0.0"),
                item("auth", "Social Login", PluginKind::Plugin, "1.1.0"),
                item("oauth-gh", "GitHub Auth", PluginKind::Plugin, "0.1.0"),
                item("lightbox", "Lightbox", PluginKind::Plugin, "2.0.0"),
            ],
            themes: vec![item("dark", "Dark", PluginKind::Theme, "1.0.0")],
        }
    }

    fn ids(list: &[CookedPlugin]) -> Vec<&str> {
        list.iter().map(|p| p.id()).collect()
    }

    #[test]
    fn test_sorted_by_name() {
        let listing = build_listing(&registry(), &[], &ListQuery::default(), "2.0.0");
        assert_eq!(ids(&listing.plugins), vec!["oauth-gh", "katex", "lightbox", "auth"]);
        assert_eq!(listing.plugins_count, 4);
        assert_eq!(listing.themes_count, 1);
    }

    #[test]
    fn test_left_join_install_state() {
        let installed = vec![local("katex", "KaTeX", PluginKind::Plugin, "0.9.0")];
        let listing = build_listing(&registry(), &installed, &ListQuery::default(), "2.0.0");

        let katex = listing.plugins.iter().find(|p| p.id() == "katex").unwrap();
        assert!(katex.installed);
        assert!(katex.upgrade_available);
        assert_eq!(katex.local_version, "0.9.0");

        let lightbox = listing.plugins.iter().find(|p| p.id() == "lightbox").unwrap();
        assert!(!lightbox.installed);
    }

    #[test]
    fn test_orphans_are_appended_once() {
        let installed = vec![
            local("legacy", "Legacy", PluginKind::Plugin, "0.1.0"),
            local("old-theme", "Old Theme", PluginKind::Theme, "0.1.0"),
            local("katex", "KaTeX", PluginKind::Plugin, "1.0.0"),
        ];
        let listing = build_listing(&registry(), &installed, &ListQuery::default(), "2.0.0");

        assert_eq!(listing.plugins_count, 5);
        assert_eq!(listing.themes_count, 2);

        let legacy = listing.plugins.iter().find(|p| p.id() == "legacy").unwrap();
        assert!(legacy.installed);
        assert!(legacy.compatible);
        assert!(!legacy.upgrade_available);
        assert!(!ids(&listing.themes).contains(&"legacy"));
        assert!(ids(&listing.themes).contains(&"old-theme"));
    }

    #[test]
    fn test_no_duplicate_ids_for_any_overlap() {
        let registry = registry();
        let registry_ids: Vec<String> = registry
            .plugins
            .iter()
            .chain(registry.themes.iter())
            .map(|i| i.id.clone())
            .collect();
        let candidates: Vec<InstalledPlugin> = registry_ids
            .iter()
            .map(String::as_str)
            .chain(["x", "y"])
            .enumerate()
            .map(|(n, id)| {
                let kind = if n % 2 == 0 {
                    PluginKind::Plugin
                } else {
                    PluginKind::Theme
                };
                local(id, id, kind, "1.0.0")
            })
            .collect();

        // every subset of the installed candidates
        for mask in 0u32..(1 << candidates.len()) {
            let installed: Vec<_> = candidates
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, p)| p.clone())
                .collect();
            let listing = build_listing(&registry, &installed, &ListQuery::default(), "2.0.0");

            let mut all: Vec<&str> = ids(&listing.plugins);
            all.extend(ids(&listing.themes));
            let unique: HashSet<&str> = all.iter().copied().collect();
            assert_eq!(unique.len(), all.len(), "duplicate id for mask {:b}", mask);
        }
    }

    #[test]
    fn test_search_name_substring_or_exact_id() {
        let query = ListQuery {
            search: Some("AUTH".to_string()),
            only_installed: false,
        };
        let listing = build_listing(&registry(), &[], &query, "2.0.0");

        // "GitHub Auth" by name, "auth" by exact id
        assert_eq!(ids(&listing.plugins), vec!["oauth-gh", "auth"]);
        assert!(listing.themes.is_empty());
    }

    #[test]
    fn test_search_id_requires_exact_match() {
        let query = ListQuery {
            search: Some("kat".to_string()),
            only_installed: false,
        };
        // "kat" is a substring of the name "KaTeX"
        assert_eq!(build_listing(&registry(), &[], &query, "2.0.0").plugins_count, 1);

        let query = ListQuery {
            search: Some("lightb".to_string()),
            only_installed: false,
        };
        assert_eq!(ids(&build_listing(&registry(), &[], &query, "2.0.0").plugins), vec!["lightbox"]);

        let query = ListQuery {
            search: Some("oauth".to_string()),
            only_installed: false,
        };
        assert!(build_listing(&registry(), &[], &query, "2.0.0").plugins.is_empty());
    }

    #[test]
    fn test_search_term_is_not_trimmed() {
        let query = ListQuery {
            search: Some(" auth".to_string()),
            only_installed: false,
        };
        // only "GitHub Auth" contains the leading space; the id "auth" is not equal
        let listing = build_listing(&registry(), &[], &query, "2.0.0");
        assert_eq!(ids(&listing.plugins), vec!["oauth-gh"]);
    }

    #[test]
    fn test_search_folds_case_the_same_for_name_and_id() {
        let registry = RegistrySnapshot {
            plugins: vec![item("Émoji", "Reactions", PluginKind::Plugin, "1.0.0")],
            themes: Vec::new(),
        };
        let query = ListQuery {
            search: Some("émoji".to_string()),
            only_installed: false,
        };
        assert_eq!(build_listing(&registry, &[], &query, "2.0.0").plugins_count, 1);
    }

    #[test]
    fn test_only_installed() {
        let installed = vec![
            local("dark", "Dark", PluginKind::Theme, "1.0.0"),
            local("legacy", "Legacy", PluginKind::Plugin, "0.1.0"),
        ];
        let query = ListQuery {
            search: None,
            only_installed: true,
        };
        let listing = build_listing(&registry(), &installed, &query, "2.0.0");
        assert_eq!(ids(&listing.plugins), vec!["legacy"]);
        assert_eq!(ids(&listing.themes), vec!["dark"]);
    }

    #[test]
    fn test_catalog_detail_view() {
        let store = Arc::new(MemoryStore::new());
        let cache = RegistryCache::new(store.clone());
        cache.put(&registry()).unwrap();
        store
            .insert(local("katex", "KaTeX", PluginKind::Plugin, "1.0.0"))
            .unwrap();
        store.upsert("katex", OPTION_CLIENT_OPTIONS, r#"{"a":1}"#).unwrap();
        store.upsert("lightbox", OPTION_CLIENT_OPTIONS, r#"{"b":2}"#).unwrap();

        let catalog = PluginCatalog::new(store.clone(), store.clone(), "2.0.0");

        let detail = catalog.get("katex").unwrap();
        assert!(detail.enabled);
        assert_eq!(detail.client_options, r#"{"a":1}"#);
        assert_eq!(detail.options_schema, "");
        assert!(detail.plugin.installed);

        // options are only surfaced for installed plugins
        let detail = catalog.get("lightbox").unwrap();
        assert!(!detail.enabled);
        assert_eq!(detail.client_options, "");
        assert!(!detail.plugin.installed);

        let detail = catalog.get("unknown").unwrap();
        assert_eq!(detail.plugin, CookedPlugin::default());
    }

    #[test]
    fn test_catalog_list_without_registry() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(local("legacy", "Legacy", PluginKind::Plugin, "0.1.0"))
            .unwrap();

        let catalog = PluginCatalog::new(store.clone(), store, "2.0.0");
        let listing = catalog.list(&ListQuery::default()).unwrap();
        assert_eq!(ids(&listing.plugins), vec!["legacy"]);
        assert!(listing.themes.is_empty());
    }
}
