//! Storage Module
//!
//! Abstract record stores used by the plugin lifecycle.
//!
//! - `memory`: in-process maps, for tests and embedding
//! - `file`: JSON documents under the base directory, replaced atomically

pub mod file;
pub mod memory;

use crate::error::Result;
use crate::plugin::types::{InstalledPlugin, PluginOption};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Keeps a store's write lock held until dropped
pub struct StoreGuard<'a> {
    _held: Box<dyn Held + 'a>,
}

trait Held {}
impl<T> Held for T {}

impl<'a> StoreGuard<'a> {
    pub(crate) fn new<T: 'a>(held: T) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

/// One record per installed plugin/theme, keyed by plugin id
pub trait InstalledPluginStore: Send + Sync {
    /// Exclude other writers until the guard drops.
    ///
    /// Reentrant on the holding thread, so the store's own writes (and, for a
    /// store that also holds options, option upserts) still go through.
    fn write_guard(&self) -> Result<StoreGuard<'_>>;

    fn find(&self, plugin_id: &str) -> Result<Option<InstalledPlugin>>;

    /// All installed records, newest first
    fn list(&self) -> Result<Vec<InstalledPlugin>>;

    /// Create a record; fails with `AlreadyInstalled` if the id is taken
    fn insert(&self, plugin: InstalledPlugin) -> Result<InstalledPlugin>;

    /// Overwrite an existing record; fails with `NotInstalled` if absent
    fn save(&self, plugin: &InstalledPlugin) -> Result<()>;

    /// Hard-delete a record, returning whether it existed
    fn delete(&self, plugin_id: &str) -> Result<bool>;
}

/// Opaque string values keyed by (plugin id, option name)
pub trait OptionStore: Send + Sync {
    fn get(&self, plugin_id: &str, name: &str) -> Result<Option<PluginOption>>;

    /// Create the row or overwrite its value in a single replace
    fn upsert(&self, plugin_id: &str, name: &str, value: &str) -> Result<PluginOption>;

    fn list_options(&self) -> Result<Vec<PluginOption>>;

    /// Value of the option, or an empty string when unset
    fn value(&self, plugin_id: &str, name: &str) -> Result<String> {
        Ok(self
            .get(plugin_id, name)?
            .map(|opt| opt.value)
            .unwrap_or_default())
    }
}
