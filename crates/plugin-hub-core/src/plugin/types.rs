//! Plugin type definitions
//!
//! Registry entries as published in `registry.json`, installed records as
//! persisted locally, and the merged view handed to administrators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Reserved plugin id under which the registry snapshot is cached
pub const REGISTRY_SENTINEL_ID: &str = "__artalk_registry_data__";
/// Option name of the cached registry snapshot
pub const OPTION_REGISTRY_DATA: &str = "registry_data";
/// Option name of the downloaded options schema
pub const OPTION_OPTIONS_SCHEMA: &str = "options_schema";
/// Option name of administrator-supplied client options
pub const OPTION_CLIENT_OPTIONS: &str = "client_options";

/// Plugin kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    #[default]
    Plugin,
    Theme,
}

impl PluginKind {
    /// Parse the registry's `type` string; `None` for anything unrecognized
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "plugin" => Some(Self::Plugin),
            "theme" => Some(Self::Theme),
            _ => None,
        }
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plugin => write!(f, "plugin"),
            Self::Theme => write!(f, "theme"),
        }
    }
}

/// Locally installed plugin or theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    /// Stable plugin id (unique among installed records)
    pub plugin_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PluginKind,
    /// Script/stylesheet URL served to the comment widget
    pub source: String,
    /// Subresource integrity hash of `source`
    pub integrity: String,
    pub version: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstalledPlugin {
    /// Build a fresh, enabled record from a registry entry
    pub fn from_registry(item: &RegistryItem) -> Self {
        let now = Utc::now();
        Self {
            plugin_id: item.id.clone(),
            name: item.name.clone(),
            kind: item.kind,
            source: item.source.clone(),
            integrity: item.integrity.clone(),
            version: item.version.clone(),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Opaque per-(plugin, name) value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOption {
    pub plugin_id: String,
    pub name: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entry of the remote registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryItem {
    pub id: String,
    pub name: String,
    /// Unrecognized or missing types read as [`PluginKind::Plugin`]
    #[serde(rename = "type", deserialize_with = "lenient_kind")]
    pub kind: PluginKind,
    pub description: String,
    pub author_name: String,
    pub author_link: String,
    pub repo_name: String,
    pub repo_link: String,
    pub npm_name: String,
    pub source: String,
    pub integrity: String,
    /// URL of the options-schema document
    pub options_schema: String,
    pub donate_link: String,
    pub verified: bool,
    pub version: String,
    pub updated_at: String,
    /// Minimum host application version; empty means no constraint
    pub min_artalk_version: String,
}

/// Cached copy of `registry.json`
///
/// A `null` list reads as empty. Entries with an unrecognized `type` take the
/// kind of the list they appear in, and entries that fail to parse are
/// skipped, so one bad entry never rejects the whole registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default, deserialize_with = "plugin_entries")]
    pub plugins: Vec<RegistryItem>,
    #[serde(default, deserialize_with = "theme_entries")]
    pub themes: Vec<RegistryItem>,
}

impl RegistrySnapshot {
    /// Find an entry by id, searching plugins before themes
    pub fn find(&self, plugin_id: &str) -> Option<&RegistryItem> {
        self.plugins
            .iter()
            .chain(self.themes.iter())
            .find(|item| item.id == plugin_id)
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty() && self.themes.is_empty()
    }
}

/// Registry metadata merged with local install state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookedPlugin {
    #[serde(flatten)]
    pub item: RegistryItem,
    pub installed: bool,
    pub enabled: bool,
    pub local_version: String,
    pub upgrade_available: bool,
    pub compatible: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub compatible_notice: String,
}

impl CookedPlugin {
    pub fn id(&self) -> &str {
        &self.item.id
    }

    pub fn name(&self) -> &str {
        &self.item.name
    }
}

/// Plugin entry handed to the comment widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledPlugin {
    pub source: String,
    pub integrity: String,
    #[serde(rename = "type")]
    pub kind: PluginKind,
}

fn lenient_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PluginKind, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(PluginKind::parse).unwrap_or_default())
}

fn plugin_entries<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<RegistryItem>, D::Error> {
    registry_entries(deserializer, PluginKind::Plugin)
}

fn theme_entries<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<RegistryItem>, D::Error> {
    registry_entries(deserializer, PluginKind::Theme)
}

fn registry_entries<'de, D: Deserializer<'de>>(
    deserializer: D,
    list_kind: PluginKind,
) -> Result<Vec<RegistryItem>, D::Error> {
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|mut value| {
            let declared = value.get("type").and_then(Value::as_str);
            if declared.and_then(PluginKind::parse).is_none() {
                tracing::warn!(
                    id = ?value.get("id"),
                    declared = ?declared,
                    "registry entry has no usable type, using {list_kind}"
                );
                if let Some(entry) = value.as_object_mut() {
                    entry.insert("type".to_string(), Value::String(list_kind.to_string()));
                }
            }

            serde_json::from_value::<RegistryItem>(value)
                .map_err(|err| tracing::warn!("skipping malformed registry entry: {err}"))
                .ok()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registry_json() {
        let json = r#"{
            "plugins": [
                {
                    "id": "katex",
                    "name": "KaTeX",
                    "type": "plugin",
                    "source": "https://cdn.example.org/katex.js",
                    "integrity": "sha512-abc",
                    "verified": true,
                    "version": "1.0.0"
                }
            ],
            "themes": [
                {
                    "id": "dark",
                    "name": "Dark",
                    "type": "theme",
                    "version": "0.2.0",
                    "min_artalk_version": "2.9.0"
                }
            ]
        }"#;

        let snapshot: RegistrySnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.plugins.len(), 1);
        assert_eq!(snapshot.plugins[0].kind, PluginKind::Plugin);
        assert!(snapshot.plugins[0].verified);
        assert_eq!(snapshot.plugins[0].min_artalk_version, "");
        assert_eq!(snapshot.themes[0].kind, PluginKind::Theme);
        assert_eq!(snapshot.find("dark").unwrap().min_artalk_version, "2.9.0");
        assert!(snapshot.find("missing").is_none());
    }

    #[test]
    fn test_unknown_type_takes_list_kind() {
        let json = r#"{
            "plugins": [{"id": "a", "type": ""}, {"id": "b", "type": "widget"}],
            "themes": [{"id": "c"}, {"id": "d", "type": "plugin"}]
        }"#;

        let snapshot: RegistrySnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.plugins.len(), 2);
        assert!(snapshot.plugins.iter().all(|p| p.kind == PluginKind::Plugin));
        assert_eq!(snapshot.find("c").unwrap().kind, PluginKind::Theme);
        // a recognized type is kept as declared
        assert_eq!(snapshot.find("d").unwrap().kind, PluginKind::Plugin);

        let item: RegistryItem = serde_json::from_str(r#"{"id":"b","type":""}"#).unwrap();
        assert_eq!(item.kind, PluginKind::Plugin);
    }

    #[test]
    fn test_null_lists_and_bad_entries() {
        let snapshot: RegistrySnapshot =
            serde_json::from_str(r#"{"plugins": null, "themes": null}"#).unwrap();
        assert!(snapshot.is_empty());

        let json = r#"{
            "plugins": [{"id": "katex", "version": "1.0.0"}, {"id": 42}, "junk"],
            "themes": null
        }"#;
        let snapshot: RegistrySnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.plugins.len(), 1);
        assert_eq!(snapshot.plugins[0].id, "katex");
        assert!(snapshot.themes.is_empty());
    }

    #[test]
    fn test_find_prefers_plugins_over_themes() {
        let snapshot = RegistrySnapshot {
            plugins: vec![RegistryItem {
                id: "dup".to_string(),
                name: "From Plugins".to_string(),
                ..Default::default()
            }],
            themes: vec![RegistryItem {
                id: "dup".to_string(),
                name: "From Themes".to_string(),
                kind: PluginKind::Theme,
                ..Default::default()
            }],
        };
        assert_eq!(snapshot.find("dup").unwrap().name, "From Plugins");
    }

    #[test]
    fn test_cooked_plugin_serializes_flat() {
        let cooked = CookedPlugin {
            item: RegistryItem {
                id: "katex".to_string(),
                ..Default::default()
            },
            installed: true,
            compatible: true,
            ..Default::default()
        };
        let value = serde_json::to_value(&cooked).unwrap();
        assert_eq!(value["id"], "katex");
        assert_eq!(value["installed"], true);
        assert_eq!(value["type"], "plugin");
        assert!(value.get("compatible_notice").is_none());
    }
}
