//! Settings provider persisted to the service's TOML config file

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use linkwatch::{SettingField, Settings, SettingsProvider};
use tracing::{debug, info, warn};

use crate::config::Config;

/// Modification stamp of the config file as last seen by the store
type Stamp = Option<(SystemTime, u64)>;

struct State {
    config: Config,
    stamp: Stamp,
}

/// Keeps the whole config in memory and rewrites the file on every change.
///
/// Edits made to the file by another process (`linkwatch settings set`
/// while `linkwatch run` is up) are picked up on the next `get`. A failed
/// write is logged and the new value still applies in memory.
pub struct FileSettingsStore {
    path: PathBuf,
    state: Mutex<State>,
}

fn stamp(path: &Path) -> Stamp {
    let metadata = fs::metadata(path).ok()?;
    Some((metadata.modified().ok()?, metadata.len()))
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        let path = path.into();
        let mut config = config;
        config.settings = config.settings.clamped();
        let stamp = stamp(&path);
        Self { path, state: Mutex::new(State { config, stamp }) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reload `[settings]` when the file changed since it was last seen
    fn refresh(&self, state: &mut State) {
        let current = stamp(&self.path);
        if current.is_none() || current == state.stamp {
            return;
        }
        state.stamp = current;

        let reloaded = fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|raw| toml::from_str::<Config>(&raw).map_err(|e| e.to_string()));
        match reloaded {
            Ok(config) => {
                let settings = config.settings.clamped();
                if settings != state.config.settings {
                    info!(path = %self.path.display(), "Settings changed on disk, reloaded");
                    state.config.settings = settings;
                }
            }
            Err(e) => warn!(path = %self.path.display(), "Ignoring unreadable settings: {}", e),
        }
    }

    fn update<T>(&self, change: impl FnOnce(&mut Settings) -> T) -> T {
        let mut state = self.lock();
        self.refresh(&mut state);
        let result = change(&mut state.config.settings);

        match state.config.write_config(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Settings saved"),
            Err(e) => warn!(path = %self.path.display(), "Failed to save settings: {}", e),
        }
        state.stamp = stamp(&self.path);
        result
    }
}

impl SettingsProvider for FileSettingsStore {
    fn get(&self) -> Settings {
        let mut state = self.lock();
        self.refresh(&mut state);
        state.config.settings
    }

    fn set(&self, field: SettingField, raw: f64) -> f64 {
        self.update(|settings| settings.set(field, raw))
    }

    fn reset(&self) -> Settings {
        self.update(|settings| {
            *settings = Settings::default();
            *settings
        })
    }
}
