//! The tray daemon.
//!
//! Everything that touches the registry, the device or the tray runs on the
//! `tao` event-loop thread. The OS hotkey listener, the tray menu listener and
//! the Ctrl+C handler only forward events into the loop through its proxy.

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;

use anyhow::{Context, Result};
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use tracing::{debug, info, warn};
use tray_icon::menu::{MenuEvent, MenuId};
use tray_icon::TrayIcon;

use shelly_hotkeys::{
    Autostart, ConfigStore, DeviceClient, Dispatcher, GlobalHotKeyEvent, GlobalHotkeyBinder,
    HotKeyState, HotkeyRegistry, ReloadReport, Settings,
};

use crate::tray::{build_tray, replace_menu, MenuAction, TrayMenu, TrayNotifier};

#[derive(Debug, Clone)]
pub enum AppEvent {
    Hotkey(u32),
    Menu(MenuId),
    Shutdown,
}

struct App {
    store: ConfigStore,
    settings: Settings,
    registry: HotkeyRegistry<GlobalHotkeyBinder>,
    dispatcher: Dispatcher<DeviceClient, TrayNotifier>,
    report: ReloadReport,
    menu: TrayMenu,
    tray: Rc<RefCell<Option<TrayIcon>>>,
}

impl App {
    fn new(store: ConfigStore) -> Result<Self> {
        let settings = store.load_or_default();
        let binder = GlobalHotkeyBinder::new().context("Failed to create hotkey manager")?;
        let registry = HotkeyRegistry::new(binder);
        let report = registry.reload(&settings.hotkeys);
        let client = DeviceClient::new(settings.request_timeout())
            .context("Failed to create HTTP client")?;

        let tray = Rc::new(RefCell::new(None));
        let dispatcher = Dispatcher::new(
            client,
            TrayNotifier::new(tray.clone()),
            settings.device_address(),
        );
        let menu = TrayMenu::build(&report);

        Ok(Self {
            store,
            settings,
            registry,
            dispatcher,
            report,
            menu,
            tray,
        })
    }

    fn show_tray(&mut self) {
        if !self.settings.minimize_to_tray {
            info!("Running without a tray icon; press Ctrl+C to quit");
            return;
        }
        *self.tray.borrow_mut() = build_tray(&self.menu);
        self.dispatcher.notifier().show(&self.summary());
    }

    fn summary(&self) -> String {
        format!(
            "{} of {} hotkeys active, device {}",
            self.report.active_count(),
            self.report.states.len(),
            self.dispatcher.address()
        )
    }

    fn on_hotkey(&self, id: u32) {
        debug!("hotkey {id} pressed");
        self.dispatcher.dispatch_hotkey_id(&self.registry, id);
    }

    /// Returns false when the app should exit.
    fn on_menu(&mut self, id: &MenuId) -> bool {
        let Some(action) = self.menu.action(id).cloned() else {
            return true;
        };
        match action {
            MenuAction::TestConnection => self.test_connection(),
            MenuAction::Fire(mapping) => {
                self.dispatcher.fire(&mapping);
            }
            MenuAction::Reload => self.reload(),
            MenuAction::Quit => return false,
        }
        true
    }

    fn test_connection(&self) {
        let address = self.dispatcher.address();
        let message = match DeviceClient::new(self.settings.request_timeout()) {
            Ok(client) => match client.test(address).error() {
                None => format!("Connected to {address}"),
                Some(e) => format!("Failed to connect to {address}: {e}"),
            },
            Err(e) => format!("Failed to connect to {address}: {e}"),
        };
        info!("{message}");
        self.dispatcher.notifier().announce(&message);
    }

    fn reload(&mut self) {
        self.settings = self.store.load_or_default();
        match DeviceClient::new(self.settings.request_timeout()) {
            Ok(client) => self.dispatcher.set_client(client),
            Err(e) => warn!("keeping previous HTTP client: {e}"),
        }
        self.dispatcher.set_address(self.settings.device_address());
        self.report = self.registry.reload(&self.settings.hotkeys);
        self.menu = TrayMenu::build(&self.report);
        if let Some(tray) = self.tray.borrow().as_ref() {
            replace_menu(tray, &self.menu);
        }
        self.dispatcher.notifier().show(&self.summary());
    }

    fn shutdown(&mut self) {
        self.registry.release_all();
        self.tray.borrow_mut().take();
        info!("Shut down");
    }
}

/// Bring the autostart entry in line with the settings file.
fn sync_autostart(settings: &Settings) {
    let result = Autostart::for_current_exe().and_then(|a| a.apply(settings.start_with_system));
    if let Err(e) = result {
        warn!("failed to update start with system: {e}");
    }
}

fn spawn_forwarders(proxy: &EventLoopProxy<AppEvent>) {
    let hotkeys = proxy.clone();
    thread::spawn(move || {
        while let Ok(event) = GlobalHotKeyEvent::receiver().recv() {
            if event.state == HotKeyState::Pressed
                && hotkeys.send_event(AppEvent::Hotkey(event.id)).is_err()
            {
                break;
            }
        }
    });

    let menu = proxy.clone();
    thread::spawn(move || {
        while let Ok(event) = MenuEvent::receiver().recv() {
            if menu.send_event(AppEvent::Menu(event.id)).is_err() {
                break;
            }
        }
    });
}

/// Run the daemon until Quit or Ctrl+C.
pub fn run(store: ConfigStore) -> Result<()> {
    info!("Using settings at {}", store.path().display());

    // The event loop must exist before hotkeys or the tray are created.
    let event_loop = EventLoopBuilder::<AppEvent>::with_user_event().build();
    let proxy = event_loop.create_proxy();

    let mut app = App::new(store)?;
    sync_autostart(&app.settings);
    spawn_forwarders(&proxy);

    let ctrlc_proxy = proxy.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_proxy.send_event(AppEvent::Shutdown);
    })
    .context("Failed to install Ctrl+C handler")?;

    info!("Starting event loop");
    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::NewEvents(StartCause::Init) => app.show_tray(),
            Event::UserEvent(AppEvent::Hotkey(id)) => app.on_hotkey(id),
            Event::UserEvent(AppEvent::Menu(id)) => {
                if !app.on_menu(&id) {
                    *control_flow = ControlFlow::Exit;
                }
            }
            Event::UserEvent(AppEvent::Shutdown) => {
                info!("Shutdown requested");
                *control_flow = ControlFlow::Exit;
            }
            Event::LoopDestroyed => app.shutdown(),
            _ => {}
        }
    });
}
