//! Plugin Module
//!
//! Registry reconciliation and lifecycle management for plugins and themes.
//!
//! - `types`: registry entries, installed records and the merged view
//! - `version`: semantic version comparisons
//! - `cache`: singleton cache of the registry snapshot
//! - `fetcher`: HTTP download of the registry and options schemas
//! - `cook`: merge of one registry entry with one installed record
//! - `catalog`: listing, search and detail views
//! - `locks`: per-identifier transition locks
//! - `manager`: install/upgrade/uninstall/update orchestration

pub mod cache;
pub mod catalog;
pub mod cook;
pub mod fetcher;
pub mod locks;
pub mod manager;
pub mod types;
pub mod version;

// Re-exports
pub use cache::RegistryCache;
pub use catalog::{build_listing, ListQuery, PluginCatalog, PluginDetail, PluginListing};
pub use cook::cook;
pub use fetcher::{registry_url, HttpFetcher, RegistrySource};
pub use locks::KeyedLocks;
pub use manager::{PluginManager, PluginUpdate};
pub use types::{
    CookedPlugin, EnabledPlugin, InstalledPlugin, PluginKind, PluginOption, RegistryItem,
    RegistrySnapshot,
};
