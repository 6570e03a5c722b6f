use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use image::{Rgba, RgbaImage};
use notify_rust::{Notification, Timeout};
use tracing::{debug, error, warn};
use tray_icon::{
    menu::{IsMenuItem, Menu, MenuId, MenuItem, PredefinedMenuItem},
    Icon, TrayIcon, TrayIconBuilder,
};

use shelly_hotkeys::dispatch::describe;
use shelly_hotkeys::{DispatchResult, HotkeyMapping, LogNotifier, Notifier, ReloadReport};

const TOOLTIP: &str = "Shelly Hotkeys";
const ICON_SIZE: u32 = 32;
const POPUP_TIMEOUT_MS: u32 = 4000;

/// What a tray menu entry does when clicked.
#[derive(Debug, Clone)]
pub enum MenuAction {
    TestConnection,
    Fire(HotkeyMapping),
    Reload,
    Quit,
}

/// The tray menu plus the action behind each item.
pub struct TrayMenu {
    menu: Menu,
    actions: HashMap<MenuId, MenuAction>,
}

impl TrayMenu {
    /// One item per mapping, disabled when the mapping is inactive.
    pub fn build(report: &ReloadReport) -> Self {
        let menu = Menu::new();
        let mut actions = HashMap::new();

        let mut add = |item: MenuItem, action: MenuAction| {
            append(&menu, &item);
            actions.insert(item.id().clone(), action);
        };

        add(
            MenuItem::new("Test Connection", true, None),
            MenuAction::TestConnection,
        );
        append(&menu, &PredefinedMenuItem::separator());
        for (mapping, state) in &report.states {
            let label = if state.is_active() {
                mapping.label()
            } else {
                format!("{} [inactive]", mapping.label())
            };
            add(
                MenuItem::new(label, state.is_active(), None),
                MenuAction::Fire(mapping.clone()),
            );
        }
        append(&menu, &PredefinedMenuItem::separator());
        add(MenuItem::new("Reload Settings", true, None), MenuAction::Reload);
        add(MenuItem::new("Quit", true, None), MenuAction::Quit);

        Self { menu, actions }
    }

    pub fn action(&self, id: &MenuId) -> Option<&MenuAction> {
        self.actions.get(id)
    }
}

fn append(menu: &Menu, item: &dyn IsMenuItem) {
    if let Err(e) = menu.append(item) {
        warn!("failed to add tray menu item: {e}");
    }
}

/// A toggle-switch glyph: an orange pill with a white knob on the right.
fn icon_image() -> RgbaImage {
    let center_y = ICON_SIZE as f32 / 2.0;
    let (left, right, radius) = (10.0_f32, 22.0_f32, 7.0_f32);
    let knob = 5.0_f32;

    RgbaImage::from_fn(ICON_SIZE, ICON_SIZE, |x, y| {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
        let dy = py - center_y;
        let nearest_x = px.clamp(left, right);
        let in_pill = (px - nearest_x).powi(2) + dy.powi(2) <= radius.powi(2);
        let in_knob = (px - right).powi(2) + dy.powi(2) <= knob.powi(2);

        if in_knob {
            Rgba([255, 255, 255, 255])
        } else if in_pill {
            Rgba([245, 130, 32, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

fn tray_icon_image() -> Option<Icon> {
    let image = icon_image();
    let (w, h) = image.dimensions();
    Icon::from_rgba(image.into_raw(), w, h).ok()
}

pub fn build_tray(menu: &TrayMenu) -> Option<TrayIcon> {
    let mut builder = TrayIconBuilder::new()
        .with_menu(Box::new(menu.menu.clone()))
        .with_tooltip(TOOLTIP);
    if let Some(icon) = tray_icon_image() {
        builder = builder.with_icon(icon);
    }
    match builder.build() {
        Ok(tray) => Some(tray),
        Err(e) => {
            error!("Failed to create tray icon: {}", e);
            None
        }
    }
}

/// Swap the tray's menu after a reload.
pub fn replace_menu(tray: &TrayIcon, menu: &TrayMenu) {
    tray.set_menu(Some(Box::new(menu.menu.clone())));
}

/// Passive notification surface: the log, the tray tooltip and a desktop
/// notification that times out on its own.
///
/// The tray may not exist (yet, or at all when running without one), in which
/// case the tooltip is skipped.
#[derive(Clone, Default)]
pub struct TrayNotifier {
    tray: Rc<RefCell<Option<TrayIcon>>>,
}

impl TrayNotifier {
    pub fn new(tray: Rc<RefCell<Option<TrayIcon>>>) -> Self {
        Self { tray }
    }

    pub fn show(&self, message: &str) {
        if let Some(tray) = self.tray.borrow().as_ref() {
            if let Err(e) = tray.set_tooltip(Some(format!("{TOOLTIP}\n{message}"))) {
                warn!("failed to update tray tooltip: {e}");
            }
        }
    }
}

    /// Update the tooltip and pop up a desktop notification.
    pub fn announce(&self, message: &str) {
        self.show(message);
        if let Err(e) = popup(message).show() {
            debug!("desktop notification failed: {e}");
        }
    }
}

fn popup(message: &str) -> Notification {
    let mut notification = Notification::new();
    notification
        .appname(TOOLTIP)
        .summary(TOOLTIP)
        .body(message)
        .timeout(Timeout::Milliseconds(POPUP_TIMEOUT_MS));
    notification
}

impl Notifier for TrayNotifier {
    fn notify(&self, result: &DispatchResult, mapping: &HotkeyMapping) {
        LogNotifier.notify(result, mapping);
        self.announce(&describe(result, mapping));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_shape() {
        let image = icon_image();
        assert_eq!(image.dimensions(), (ICON_SIZE, ICON_SIZE));
        // Corners are transparent, the knob is white, the left end is orange.
        assert_eq!(image.get_pixel(0, 0)[3], 0);
        assert_eq!(*image.get_pixel(22, 16), Rgba([255, 255, 255, 255]));
        assert_eq!(*image.get_pixel(8, 16), Rgba([245, 130, 32, 255]));
    }

    #[test]
    fn test_popup_carries_message() {
        let notification = popup("Lamp: switched relay/0 (toggle)");
        assert_eq!(notification.summary, TOOLTIP);
        assert_eq!(notification.body, "Lamp: switched relay/0 (toggle)");
        assert_eq!(notification.timeout, Timeout::Milliseconds(POPUP_TIMEOUT_MS));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_menu_layout() {
        use shelly_hotkeys::{Action, MappingState, RegistrationError};

        let lamp = HotkeyMapping::new("Lamp", "Ctrl+Alt+L", "relay/0", Action::Toggle);
        let fan = HotkeyMapping::new("Fan", "Ctrl+Alt+L", "relay/1", Action::On);
        let report = ReloadReport {
            states: vec![
                (lamp.clone(), MappingState::Active),
                (
                    fan,
                    MappingState::Inactive(RegistrationError::AlreadyBound("Ctrl+Alt+L".into())),
                ),
            ],
        };

        let tray = TrayMenu::build(&report);
        let items = tray.menu.items();
        // Test Connection, separator, two mappings, separator, Reload, Quit.
        assert_eq!(items.len(), 7);
        assert_eq!(tray.actions.len(), 5);
        assert!(matches!(
            tray.action(items[0].id()),
            Some(MenuAction::TestConnection)
        ));
        assert!(matches!(
            tray.action(items[2].id()),
            Some(MenuAction::Fire(m)) if *m == lamp
        ));
        let fan_item = items[3].as_menuitem().unwrap();
        assert_eq!(fan_item.text(), "Fan (on) [inactive]");
        assert!(!fan_item.is_enabled());
        assert!(matches!(tray.action(items[6].id()), Some(MenuAction::Quit)));
    }
}
