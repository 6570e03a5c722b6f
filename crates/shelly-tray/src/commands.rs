//! One-shot settings commands: list, edit, and poke the device.

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use shelly_hotkeys::dispatch::describe;
use shelly_hotkeys::{
    Autostart, ConfigError, ConfigStore, DeviceAddress, DeviceClient, Dispatcher, HotkeyMapping,
    LogNotifier, Settings,
};

/// Load settings for editing. A missing file starts from defaults, but a
/// corrupt one is an error so it is never silently overwritten.
fn load_for_edit(store: &ConfigStore) -> Result<Settings> {
    match store.load() {
        Ok(settings) => Ok(settings),
        Err(ConfigError::NotFound(_)) => Ok(Settings::default()),
        Err(e) => Err(e).context("Fix or remove the settings file first"),
    }
}

fn client_for(settings: &Settings) -> Result<DeviceClient> {
    DeviceClient::new(settings.request_timeout()).context("Failed to create HTTP client")
}

pub fn list(store: &ConfigStore) -> Result<()> {
    let settings = store.load_or_default();
    println!("Settings: {}", store.path().display());
    println!("Device:   {}", settings.device_host);
    println!(
        "Flags:    start with system: {}, minimize to tray: {}",
        settings.start_with_system, settings.minimize_to_tray
    );
    if settings.hotkeys.is_empty() {
        println!("\nNo hotkeys configured.");
        return Ok(());
    }

    println!("\nHotkeys:");
    for mapping in &settings.hotkeys {
        let status = match settings.validate_mapping(mapping) {
            Ok(()) => "ok".to_string(),
            Err(e) => e.to_string(),
        };
        println!(
            "  {:<20} {:<16} {:<12} {:<7} {status}",
            mapping.name, mapping.hotkey, mapping.endpoint, mapping.action
        );
    }
    Ok(())
}

pub fn add(store: &ConfigStore, mapping: HotkeyMapping) -> Result<()> {
    let mut settings = load_for_edit(store)?;
    let name = mapping.name.clone();
    settings
        .upsert_mapping(mapping)
        .with_context(|| format!("Cannot add {name:?}"))?;
    store.save(&settings)?;
    println!("Saved {name:?}. Use \"Reload Settings\" in the tray to apply.");
    Ok(())
}

pub fn remove(store: &ConfigStore, name: &str) -> Result<()> {
    let mut settings = load_for_edit(store)?;
    if settings.remove_mapping(name).is_none() {
        bail!("No hotkey named {name:?}");
    }
    store.save(&settings)?;
    println!("Removed {name:?}.");
    Ok(())
}

pub fn set_host(store: &ConfigStore, host: &str) -> Result<()> {
    let address = DeviceAddress::new(host.trim());
    address.base_url()?;
    let mut settings = load_for_edit(store)?;
    settings.device_host = address.host;
    store.save(&settings)?;
    println!("Device set to {}.", settings.device_host);
    Ok(())
}

pub fn test(store: &ConfigStore) -> Result<()> {
    let settings = store.load_or_default();
    let address = settings.device_address();
    match client_for(&settings)?.test(&address).error() {
        None => {
            println!("Successfully connected to {address}.");
            Ok(())
        }
        Some(e) => Err(anyhow!("Failed to connect to {address}: {e}")),
    }
}

pub fn fire(store: &ConfigStore, name: &str) -> Result<()> {
    let settings = store.load_or_default();
    let mapping = settings
        .find(name)
        .ok_or_else(|| anyhow!("No hotkey named {name:?}"))?;
    let dispatcher = Dispatcher::new(
        client_for(&settings)?,
        LogNotifier,
        settings.device_address(),
    );

    let result = dispatcher.fire(mapping);
    let message = describe(&result, mapping);
    if result.is_success() {
        println!("{message}");
        Ok(())
    } else {
        Err(anyhow!(message))
    }
}

pub fn status(store: &ConfigStore, endpoint: &str) -> Result<()> {
    let settings = store.load_or_default();
    let status = client_for(&settings)?
        .status(&settings.device_address(), endpoint)
        .with_context(|| format!("Failed to read {endpoint}"))?;
    println!("{endpoint}: {}", if status.ison { "on" } else { "off" });
    Ok(())
}

pub fn autostart(store: &ConfigStore, enabled: bool) -> Result<()> {
    let mut settings = load_for_edit(store)?;
    settings.start_with_system = enabled;
    store.save(&settings)?;

    Autostart::for_current_exe()?.apply(enabled)?;
    info!("start with system: {enabled}");
    println!(
        "Start with system {}.",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}
