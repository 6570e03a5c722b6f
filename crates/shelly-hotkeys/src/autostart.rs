//! Start-with-system support.
//!
//! Backed by `auto-launch`: an XDG autostart entry on Linux, the `Run`
//! registry key on Windows and a launch agent on macOS.

use std::path::Path;

use auto_launch::{AutoLaunch, AutoLaunchBuilder};
use tracing::info;

use crate::error::AutostartError;

/// Name of the autostart entry.
pub const APP_NAME: &str = "shelly-hotkeys";

/// The autostart entry for one executable, launched with `run`.
pub struct Autostart {
    launcher: AutoLaunch,
}

impl Autostart {
    pub fn new(executable: &Path) -> Result<Self, AutostartError> {
        let path = executable
            .to_str()
            .ok_or_else(|| AutostartError::InvalidPath(executable.to_path_buf()))?;
        let launcher = AutoLaunchBuilder::new()
            .set_app_name(APP_NAME)
            .set_app_path(path)
            .set_use_launch_agent(true)
            .set_args(&["run"])
            .build()?;
        Ok(Self { launcher })
    }

    /// The entry for the running executable.
    pub fn for_current_exe() -> Result<Self, AutostartError> {
        Self::new(&std::env::current_exe()?)
    }

    pub fn is_enabled(&self) -> Result<bool, AutostartError> {
        Ok(self.launcher.is_enabled()?)
    }

    /// Create or remove the entry so it matches `enabled`.
    pub fn apply(&self, enabled: bool) -> Result<(), AutostartError> {
        if self.is_enabled()? == enabled {
            return Ok(());
        }
        if enabled {
            self.launcher.enable()?;
            info!("enabled start with system");
        } else {
            self.launcher.disable()?;
            info!("disabled start with system");
        }
        Ok(())
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn test_enable_disable() {
        // Keep the entry out of the real user's autostart directory.
        let home = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", home.path());
        std::env::set_var("XDG_CONFIG_HOME", home.path().join(".config"));

        let autostart = Autostart::new(Path::new("/opt/shelly/shelly-tray")).unwrap();

        assert!(!autostart.is_enabled().unwrap());
        autostart.apply(true).unwrap();
        assert!(autostart.is_enabled().unwrap());
        let entry = home
            .path()
            .join(".config/autostart")
            .join(format!("{APP_NAME}.desktop"));
        let text = std::fs::read_to_string(entry).unwrap();
        assert!(text.contains("/opt/shelly/shelly-tray"), "{text}");

        autostart.apply(false).unwrap();
        assert!(!autostart.is_enabled().unwrap());
        // Disabling twice is fine.
        autostart.apply(false).unwrap();
    }
}
