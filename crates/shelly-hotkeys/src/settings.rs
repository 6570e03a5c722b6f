//! Persistent settings: the device address, the hotkey mappings and the two
//! application flags. Stored as RON.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::device::DEFAULT_TIMEOUT;
use crate::error::{ConfigError, RegistrationError};
use crate::mapping::{Action, DeviceAddress, HotkeyMapping};

const SETTINGS_FILE: &str = "config.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub device_host: String,
    pub request_timeout_ms: u64,
    pub start_with_system: bool,
    pub minimize_to_tray: bool,
    pub hotkeys: Vec<HotkeyMapping>,
}

impl Default for Settings {
    /// First-run settings.
    fn default() -> Self {
        Self {
            device_host: "192.168.1.100".to_string(),
            request_timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            start_with_system: false,
            minimize_to_tray: true,
            hotkeys: vec![HotkeyMapping::new(
                "Toggle Light",
                "Ctrl+Alt+L",
                "relay/0",
                Action::Toggle,
            )],
        }
    }
}

impl Settings {
    /// Defaults with no mappings, used when the settings file is unreadable.
    pub fn empty() -> Self {
        Self {
            hotkeys: Vec::new(),
            ..Self::default()
        }
    }

    pub fn device_address(&self) -> DeviceAddress {
        DeviceAddress::new(self.device_host.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    pub fn from_ron(text: &str) -> Result<Self, String> {
        ron::from_str(text).map_err(|e| e.to_string())
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn find(&self, name: &str) -> Option<&HotkeyMapping> {
        self.hotkeys.iter().find(|m| m.name == name)
    }

    /// Check that `mapping` could join the current set: its chord parses and
    /// no other mapping (other than one with the same name) uses the chord.
    pub fn validate_mapping(&self, mapping: &HotkeyMapping) -> Result<(), RegistrationError> {
        let chord = mapping.chord()?;
        for other in &self.hotkeys {
            if other.name == mapping.name {
                continue;
            }
            if other.chord().ok() == Some(chord) {
                return Err(RegistrationError::AlreadyBound(format!(
                    "{chord} (used by {:?})",
                    other.name
                )));
            }
        }
        Ok(())
    }

    /// Validate and insert `mapping`, replacing any mapping with the same
    /// name in place.
    pub fn upsert_mapping(&mut self, mapping: HotkeyMapping) -> Result<(), RegistrationError> {
        self.validate_mapping(&mapping)?;
        match self.hotkeys.iter_mut().find(|m| m.name == mapping.name) {
            Some(existing) => *existing = mapping,
            None => self.hotkeys.push(mapping),
        }
        Ok(())
    }

    /// Remove the mapping called `name`, returning it.
    pub fn remove_mapping(&mut self, name: &str) -> Option<HotkeyMapping> {
        let index = self.hotkeys.iter().position(|m| m.name == name)?;
        Some(self.hotkeys.remove(index))
    }
}

/// Reads and writes [`Settings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform config directory, e.g.
    /// `~/.config/shelly-hotkeys/config.ron` on Linux.
    pub fn default_location() -> Result<Self, ConfigError> {
        let dirs =
            ProjectDirs::from("com", "shelly", "shelly-hotkeys").ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(dirs.config_dir().join(SETTINGS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Settings, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        Settings::from_ron(&text).map_err(|reason| ConfigError::ParseFailure {
            path: self.path.clone(),
            reason,
        })
    }

    /// Load settings, never failing.
    ///
    /// A missing file yields first-run defaults; any other failure is logged
    /// and yields empty defaults. Nothing is written back.
    pub fn load_or_default(&self) -> Settings {
        match self.load() {
            Ok(settings) => {
                debug!("loaded settings from {}", self.path.display());
                settings
            }
            Err(ConfigError::NotFound(path)) => {
                info!("no settings at {}, using defaults", path.display());
                Settings::default()
            }
            Err(e) => {
                warn!("{e}; starting with an empty configuration");
                Settings::empty()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, settings.to_ron()?)?;
        debug!("saved settings to {}", self.path.display());
        Ok(())
    }
}
