use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::SettingsError;

pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Directory name used under the platform config dir when Tauri's path
/// resolver is not available.
pub const APP_IDENTIFIER: &str = "com.wannote.app";

pub const DEFAULT_FONT: &str = "Fredoka";

// Only one theme ships; any theme string in the file maps to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    #[serde(other)]
    Night,
}

// App settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub first_time_setup: bool,
    pub theme: Theme,
    pub font: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_opened_project: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            first_time_setup: true,
            theme: Theme::Night,
            font: DEFAULT_FONT.to_string(),
            last_opened_project: None,
        }
    }
}

/// Checks the fields a settings file must carry before we trust it.
fn check_required_fields(value: &Value) -> Result<(), String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "settings root is not an object".to_string())?;

    let checks: [(&str, fn(&Value) -> bool, &str); 3] = [
        ("firstTimeSetup", Value::is_boolean, "boolean"),
        ("theme", Value::is_string, "string"),
        ("font", Value::is_string, "string"),
    ];
    for (key, is_valid, expected) in checks {
        match obj.get(key) {
            Some(v) if is_valid(v) => {}
            Some(_) => return Err(format!("'{}' must be a {}", key, expected)),
            None => return Err(format!("missing '{}'", key)),
        }
    }
    Ok(())
}

fn parse_settings(content: &str) -> Result<AppSettings, String> {
    let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    check_required_fields(&value)?;
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Process-wide settings persisted as `settings.json` in the config directory.
pub struct SettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            path: config_dir.as_ref().join(SETTINGS_FILE_NAME),
            write_lock: Mutex::new(()),
        }
    }

    /// Store rooted at `<platform config dir>/com.wannote.app`.
    pub fn in_default_location() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join(APP_IDENTIFIER)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the settings file, creating or repairing it with defaults.
    ///
    /// Corruption is never fatal: an unreadable or malformed file is replaced
    /// by the defaults, which are returned.
    pub fn load_or_create(&self) -> AppSettings {
        if !self.path.exists() {
            log::info!("No settings at {}, writing defaults", self.path.display());
            let defaults = AppSettings::default();
            self.save(&defaults);
            return defaults;
        }

        let parsed = std::fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|content| parse_settings(&content));

        match parsed {
            Ok(settings) => settings,
            Err(reason) => {
                log::warn!(
                    "Settings file {} corrupted ({}), recreating with defaults",
                    self.path.display(),
                    reason
                );
                let defaults = AppSettings::default();
                self.save(&defaults);
                defaults
            }
        }
    }

    /// Best-effort save: failures are logged, never surfaced.
    pub fn save(&self, settings: &AppSettings) {
        if let Err(e) = self.try_save(settings) {
            log::error!("{}", e);
        }
    }

    pub fn try_save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let content = serde_json::to_string_pretty(settings)?;
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        std::fs::write(&self.path, content).map_err(io_err)?;
        Ok(())
    }
}
