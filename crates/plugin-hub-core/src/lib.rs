pub mod config;
pub mod error;
pub mod plugin;
pub mod store;

pub use config::{default_base_dir, Config, PluginConfig};
pub use error::{ErrorResponse, PluginHubError, Result};
pub use plugin::{
    cook, CookedPlugin, EnabledPlugin, HttpFetcher, InstalledPlugin, ListQuery, PluginCatalog,
    PluginDetail, PluginKind, PluginListing, PluginManager, PluginOption, PluginUpdate,
    RegistryCache, RegistryItem, RegistrySnapshot, RegistrySource,
};
pub use store::{InstalledPluginStore, JsonFileStore, MemoryStore, OptionStore};
