//! JSON file stores
//!
//! Manages `plugins.json` and `plugin_options.json` under `<base>/data`.
//! Writers take an exclusive lock on `data/.lock`, so separate handles and
//! separate processes never interleave a read-modify-write cycle.

use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use fs4::fs_std::FileExt;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{PluginHubError, Result};
use crate::plugin::types::{InstalledPlugin, PluginOption};
use crate::store::{InstalledPluginStore, OptionStore, StoreGuard};

const DATA_DIR: &str = "data";
const PLUGINS_FILE: &str = "plugins.json";
const OPTIONS_FILE: &str = "plugin_options.json";
const LOCK_FILE: &str = ".lock";
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_POLL: Duration = Duration::from_millis(20);

/// File-backed stores; every write replaces the whole document atomically
pub struct JsonFileStore {
    data_dir: PathBuf,
    lock: ReentrantMutex<RefCell<LockState>>,
}

/// Open lock file and how many guards on this handle hold it
#[derive(Default)]
struct LockState {
    file: Option<File>,
    depth: usize,
}

/// Releases the file lock when the outermost guard drops
struct FileLockGuard<'a> {
    state: ReentrantMutexGuard<'a, RefCell<LockState>>,
}

impl Drop for FileLockGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.depth -= 1;
        if state.depth == 0 {
            if let Some(file) = state.file.take() {
                let _ = FileExt::unlock(&file);
            }
        }
    }
}

impl JsonFileStore {
    /// Create a store rooted at `<base_dir>/data`
    pub fn new(base_dir: &Path) -> Self {
        Self::with_dir(base_dir.join(DATA_DIR))
    }

    /// Create with a custom data directory (for testing)
    pub fn with_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            lock: ReentrantMutex::new(RefCell::new(LockState::default())),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn acquire(&self) -> Result<FileLockGuard<'_>> {
        let state = self.lock.lock();
        {
            let mut inner = state.borrow_mut();
            if inner.depth == 0 {
                fs::create_dir_all(&self.data_dir)?;
                let file = OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .truncate(false)
                    .open(self.data_dir.join(LOCK_FILE))?;
                wait_for_lock(&file, &self.data_dir)?;
                inner.file = Some(file);
            }
            inner.depth += 1;
        }
        Ok(FileLockGuard { state })
    }

    fn load<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.data_dir.join(file);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            PluginHubError::Persistence(format!("{}: {}", path.display(), e))
        })
    }

    fn store<T: Serialize>(&self, file: &str, records: &[T]) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;

        let path = self.data_dir.join(file);
        let content = serde_json::to_string_pretty(records).map_err(PluginHubError::persistence)?;

        // Write beside the target, then rename over it
        let mut tmp = NamedTempFile::new_in(&self.data_dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| PluginHubError::Io(e.error))?;

        Ok(())
    }

    fn load_plugins(&self) -> Result<Vec<InstalledPlugin>> {
        self.load(PLUGINS_FILE)
    }

    fn load_options(&self) -> Result<Vec<PluginOption>> {
        self.load(OPTIONS_FILE)
    }
}

impl InstalledPluginStore for JsonFileStore {
    fn write_guard(&self) -> Result<StoreGuard<'_>> {
        Ok(StoreGuard::new(self.acquire()?))
    }

    fn find(&self, plugin_id: &str) -> Result<Option<InstalledPlugin>> {
        Ok(self
            .load_plugins()?
            .into_iter()
            .find(|p| p.plugin_id == plugin_id))
    }

    fn list(&self) -> Result<Vec<InstalledPlugin>> {
        let mut plugins = self.load_plugins()?;
        plugins.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plugins)
    }

    fn insert(&self, plugin: InstalledPlugin) -> Result<InstalledPlugin> {
        let _guard = self.acquire()?;
        let mut plugins = self.load_plugins()?;

        if plugins.iter().any(|p| p.plugin_id == plugin.plugin_id) {
            return Err(PluginHubError::AlreadyInstalled {
                id: plugin.plugin_id,
            });
        }

        plugins.push(plugin.clone());
        self.store(PLUGINS_FILE, &plugins)?;
        Ok(plugin)
    }

    fn save(&self, plugin: &InstalledPlugin) -> Result<()> {
        let _guard = self.acquire()?;
        let mut plugins = self.load_plugins()?;

        let existing = plugins
            .iter_mut()
            .find(|p| p.plugin_id == plugin.plugin_id)
            .ok_or_else(|| PluginHubError::NotInstalled {
                id: plugin.plugin_id.clone(),
            })?;
        *existing = plugin.clone();

        self.store(PLUGINS_FILE, &plugins)
    }

    fn delete(&self, plugin_id: &str) -> Result<bool> {
        let _guard = self.acquire()?;
        let mut plugins = self.load_plugins()?;

        let before = plugins.len();
        plugins.retain(|p| p.plugin_id != plugin_id);
        if plugins.len() == before {
            return Ok(false);
        }

        self.store(PLUGINS_FILE, &plugins)?;
        Ok(true)
    }
}

impl OptionStore for JsonFileStore {
    fn get(&self, plugin_id: &str, name: &str) -> Result<Option<PluginOption>> {
        Ok(self
            .load_options()?
            .into_iter()
            .find(|opt| opt.plugin_id == plugin_id && opt.name == name))
    }

    fn upsert(&self, plugin_id: &str, name: &str, value: &str) -> Result<PluginOption> {
        let _guard = self.acquire()?;
        let mut options = self.load_options()?;
        let now = Utc::now();

        let option = match options
            .iter_mut()
            .find(|opt| opt.plugin_id == plugin_id && opt.name == name)
        {
            Some(existing) => {
                existing.value = value.to_string();
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let created = PluginOption {
                    plugin_id: plugin_id.to_string(),
                    name: name.to_string(),
                    value: value.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                options.push(created.clone());
                created
            }
        };

        self.store(OPTIONS_FILE, &options)?;
        Ok(option)
    }

    fn list_options(&self) -> Result<Vec<PluginOption>> {
        self.load_options()
    }
}

fn wait_for_lock(file: &File, data_dir: &Path) -> Result<()> {
    let start = Instant::now();
    loop {
        if matches!(FileExt::try_lock_exclusive(file), Ok(true)) {
            return Ok(());
        }

        if start.elapsed() >= LOCK_TIMEOUT {
            return Err(PluginHubError::Persistence(format!(
                "timed out waiting for store lock in {}",
                data_dir.display()
            )));
        }

        thread::sleep(LOCK_POLL);
    }
}
