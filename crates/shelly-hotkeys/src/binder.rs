use global_hotkey::GlobalHotKeyManager;
use tracing::trace;

use crate::chord::Chord;
use crate::error::RegistrationError;

/// The OS capability the registry needs: claim and release a global chord.
///
/// Press events are delivered out of band (see
/// [`global_hotkey::GlobalHotKeyEvent::receiver`]) and identified by
/// [`Chord::hotkey_id`].
pub trait HotkeyBinder {
    fn bind(&self, chord: &Chord) -> Result<(), RegistrationError>;
    fn unbind(&self, chord: &Chord) -> Result<(), RegistrationError>;
}

/// Binder backed by the platform's global hotkey API.
///
/// On macOS this must be created on the main thread.
pub struct GlobalHotkeyBinder {
    manager: GlobalHotKeyManager,
}

impl GlobalHotkeyBinder {
    pub fn new() -> Result<Self, RegistrationError> {
        let manager = GlobalHotKeyManager::new()
            .map_err(|e| RegistrationError::Platform(format!("failed to create hotkey manager: {e}")))?;
        Ok(Self { manager })
    }
}

impl HotkeyBinder for GlobalHotkeyBinder {
    fn bind(&self, chord: &Chord) -> Result<(), RegistrationError> {
        trace!("registering {chord} with the OS");
        self.manager.register(chord.to_hotkey()).map_err(|e| match RegistrationError::from(e) {
            RegistrationError::AlreadyBound(_) => RegistrationError::AlreadyBound(chord.to_string()),
            other => other,
        })
    }

    fn unbind(&self, chord: &Chord) -> Result<(), RegistrationError> {
        trace!("releasing {chord}");
        self.manager
            .unregister(chord.to_hotkey())
            .map_err(RegistrationError::from)
    }
}
