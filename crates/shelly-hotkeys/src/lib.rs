//! Global hotkeys for Shelly relays.
//!
//! This crate binds key combinations to relay commands. A [`HotkeyRegistry`]
//! owns the OS bindings, a [`Dispatcher`] turns a fired chord into one HTTP
//! call through a [`DeviceClient`], and [`ConfigStore`] persists the mappings
//! and the device address.

pub use global_hotkey::hotkey::{Code, Modifiers};
pub use global_hotkey::{GlobalHotKeyEvent, HotKeyState};

pub mod autostart;
pub mod binder;
pub mod chord;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod settings;

pub use autostart::Autostart;
pub use binder::{GlobalHotkeyBinder, HotkeyBinder};
pub use chord::Chord;
pub use device::{DeviceClient, DispatchResult, RelayClient, RelayStatus};
pub use dispatch::{Dispatcher, LogNotifier, Notifier};
pub use error::{AutostartError, ConfigError, DispatchError, RegistrationError};
pub use mapping::{Action, DeviceAddress, HotkeyMapping};
pub use registry::{HotkeyRegistry, MappingState, RegistrationHandle, ReloadReport};
pub use settings::{ConfigStore, Settings};
