//! Display settings with hot reload
//!
//! The description format is persisted as TOML. Saving it, or editing the
//! file by hand while the watcher runs, tells every lens to re-render
//! through the same reload broadcast a recompute uses.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use metrilens_broadcaster::ReloadHub;
use metrilens_cache::DEFAULT_DESCRIPTION_FORMAT;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// User-chosen display preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensSettings {
    /// Description shown above each symbol; see `metrilens_cache::format`
    pub description_format: String,
}

impl Default for LensSettings {
    fn default() -> Self {
        Self {
            description_format: DEFAULT_DESCRIPTION_FORMAT.to_string(),
        }
    }
}

/// Settings persisted on disk, cached in memory
pub struct SettingsStore {
    path: PathBuf,
    current: Arc<RwLock<LensSettings>>,
    hub: Option<Arc<ReloadHub>>,

    /// File watcher handle
    _watcher: Option<RecommendedWatcher>,
}

impl SettingsStore {
    /// Open the store; an unreadable file falls back to defaults
    pub fn new(path: impl AsRef<Path>, hub: Option<Arc<ReloadHub>>) -> Self {
        let path = path.as_ref().to_path_buf();

        let settings = Self::read_file(&path).unwrap_or_else(|e| {
            warn!("Failed to load settings from {:?}: {:#}", path, e);
            LensSettings::default()
        });

        Self {
            path,
            current: Arc::new(RwLock::new(settings)),
            hub,
            _watcher: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> LensSettings {
        match self.current.read() {
            Ok(settings) => settings.clone(),
            Err(_) => LensSettings::default(),
        }
    }

    /// Current description format, never failing
    pub fn description_format(&self) -> String {
        self.settings().description_format
    }

    /// Persist `settings` and tell every subscriber to re-render.
    ///
    /// The in-memory copy is updated before the file is written, so the
    /// watcher sees our own write as unchanged and does not broadcast again.
    pub async fn save(&self, settings: LensSettings) -> Result<()> {
        let previous = self.replace_current(settings.clone());

        if let Err(e) = Self::write_file(&self.path, &settings) {
            self.replace_current(previous);
            return Err(e);
        }

        info!("Settings saved to {:?}", self.path);

        if let Some(hub) = &self.hub {
            hub.broadcast_reload().await;
        }

        Ok(())
    }

    /// Re-read the file; returns whether anything changed
    pub fn reload(&self) -> Result<bool> {
        Self::reload_into(&self.path, &self.current)
    }

    /// Watch the settings file and broadcast a reload on external edits.
    ///
    /// `runtime` runs the broadcast, since notify calls back on its own thread.
    pub fn start_watching(&mut self, runtime: Handle) -> Result<()> {
        let path = self.path.clone();
        let current = Arc::clone(&self.current);
        let hub = self.hub.clone();

        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let touches_settings = event.paths.iter().any(|p| p == &path);
                    if !touches_settings || !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }

                    match Self::reload_into(&path, &current) {
                        Ok(true) => {
                            info!("Settings file changed, reloading lenses");
                            if let Some(hub) = hub.clone() {
                                runtime.spawn(async move {
                                    hub.broadcast_reload().await;
                                });
                            }
                        }
                        Ok(false) => debug!("Settings file touched without changes"),
                        Err(e) => error!("Failed to reload settings: {:#}", e),
                    }
                }
                Err(e) => error!("Settings watch error: {}", e),
            })?;

        // Watch the directory (not just the file, in case it's recreated)
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .context("Settings path has no parent directory")?;
        fs::create_dir_all(parent).context("Failed to create settings directory")?;
        watcher.watch(parent, RecursiveMode::NonRecursive)?;

        self._watcher = Some(watcher);
        info!("Watching {:?} for changes", self.path);
        Ok(())
    }

    fn replace_current(&self, settings: LensSettings) -> LensSettings {
        match self.current.write() {
            Ok(mut current) => std::mem::replace(&mut *current, settings),
            Err(_) => LensSettings::default(),
        }
    }

    fn reload_into(path: &Path, current: &RwLock<LensSettings>) -> Result<bool> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e).context("Failed to read settings file"),
        };

        // An editor truncating the file before writing it
        if contents.trim().is_empty() {
            return Ok(false);
        }

        let loaded: LensSettings =
            toml::from_str(&contents).context("Failed to parse settings file")?;

        let mut current = current
            .write()
            .map_err(|_| anyhow::anyhow!("Settings lock poisoned"))?;
        if *current == loaded {
            return Ok(false);
        }
        *current = loaded;
        Ok(true)
    }

    fn read_file(path: &Path) -> Result<LensSettings> {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).context("Failed to parse settings file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LensSettings::default()),
            Err(e) => Err(e).context("Failed to read settings file"),
        }
    }

    fn write_file(path: &Path, settings: &LensSettings) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }

        let contents = toml::to_string_pretty(settings).context("Failed to serialize settings")?;

        // Write then rename so readers never see a truncated file
        let mut temp_path = path.as_os_str().to_owned();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        fs::write(&temp_path, contents).context("Failed to write settings file")?;
        fs::rename(&temp_path, path).context("Failed to replace settings file")?;
        Ok(())
    }
}
