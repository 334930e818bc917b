//! Plugin Reconciler
//!
//! Merges a registry entry and an installed record into a [`CookedPlugin`].

use crate::plugin::types::{CookedPlugin, InstalledPlugin, RegistryItem};
use crate::plugin::version;

/// Build the merged view for every presence/absence combination.
///
/// Unparseable versions never fail the merge: the affected comparison
/// reports incompatible / no upgrade and a warning is logged.
pub fn cook(
    registry: Option<&RegistryItem>,
    installed: Option<&InstalledPlugin>,
    app_version: &str,
) -> CookedPlugin {
    match (registry, installed) {
        (None, None) => CookedPlugin::default(),
        (Some(item), None) => from_registry(item, app_version),
        (None, Some(local)) => from_installed(local),
        (Some(item), Some(local)) => {
            let mut plugin = from_registry(item, app_version);
            apply_install_state(&mut plugin, local);
            plugin.upgrade_available = upgrade_available(item, local);
            plugin
        }
    }
}

fn from_registry(item: &RegistryItem, app_version: &str) -> CookedPlugin {
    let mut plugin = CookedPlugin {
        item: item.clone(),
        ..Default::default()
    };

    match version::satisfies_min(&item.min_artalk_version, app_version) {
        Ok(true) => plugin.compatible = true,
        Ok(false) => {
            plugin.compatible_notice = format!(
                "The plugin requires at least Artalk v{}.",
                item.min_artalk_version.trim_start_matches('v')
            );
        }
        Err(err) => {
            tracing::warn!(plugin = %item.id, "cannot check compatibility: {err}");
            plugin.compatible_notice = format!(
                "Unable to verify compatibility with minimum version '{}'.",
                item.min_artalk_version
            );
        }
    }

    plugin
}

/// Installed record with no registry entry; nothing constrains compatibility
fn from_installed(local: &InstalledPlugin) -> CookedPlugin {
    let mut plugin = CookedPlugin {
        item: RegistryItem {
            id: local.plugin_id.clone(),
            name: local.name.clone(),
            kind: local.kind,
            source: local.source.clone(),
            integrity: local.integrity.clone(),
            version: local.version.clone(),
            ..Default::default()
        },
        compatible: true,
        ..Default::default()
    };
    apply_install_state(&mut plugin, local);
    plugin
}

fn apply_install_state(plugin: &mut CookedPlugin, local: &InstalledPlugin) {
    plugin.installed = true;
    plugin.enabled = local.enabled;
    plugin.local_version = local.version.clone();
}

fn upgrade_available(item: &RegistryItem, local: &InstalledPlugin) -> bool {
    version::is_newer(&item.version, &local.version).unwrap_or_else(|err| {
        tracing::warn!(plugin = %item.id, "cannot compare versions: {err}");
        false
    })
}
