use tracing::{info, warn};

use crate::binder::HotkeyBinder;
use crate::chord::Chord;
use crate::device::{DispatchResult, RelayClient};
use crate::error::DispatchError;
use crate::mapping::{DeviceAddress, HotkeyMapping};
use crate::registry::HotkeyRegistry;

/// Receives the outcome of every dispatched command.
///
/// Implementations must not block waiting for the user: a hotkey can fire
/// while no window is visible.
pub trait Notifier {
    fn notify(&self, result: &DispatchResult, mapping: &HotkeyMapping);
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, result: &DispatchResult, mapping: &HotkeyMapping) {
        let message = describe(result, mapping);
        if result.is_success() {
            info!("{message}");
        } else {
            warn!("{message}");
        }
    }
}

/// One-line, user-facing summary of a dispatch.
pub fn describe(result: &DispatchResult, mapping: &HotkeyMapping) -> String {
    match result {
        DispatchResult::Success { .. } => format!(
            "{}: switched {} ({})",
            mapping.name, mapping.endpoint, mapping.action
        ),
        DispatchResult::Failure(DispatchError::HttpError(status)) => {
            format!("{}: error: status code {status}", mapping.name)
        }
        DispatchResult::Failure(e) => format!("{}: failed: {e}", mapping.name),
    }
}

/// Turns fired chords into device calls.
pub struct Dispatcher<C, N> {
    client: C,
    notifier: N,
    address: DeviceAddress,
}

impl<C: RelayClient, N: Notifier> Dispatcher<C, N> {
    pub fn new(client: C, notifier: N, address: DeviceAddress) -> Self {
        Self {
            client,
            notifier,
            address,
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn set_address(&mut self, address: DeviceAddress) {
        self.address = address;
    }

    pub fn set_client(&mut self, client: C) {
        self.client = client;
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Handle a fired chord.
    ///
    /// A chord with no active mapping (for example one released by a reload
    /// that raced the key press) is ignored and returns `None`.
    pub fn dispatch<B: HotkeyBinder>(
        &self,
        registry: &HotkeyRegistry<B>,
        chord: &Chord,
    ) -> Option<DispatchResult> {
        let Some(mapping) = registry.lookup(chord) else {
            info!("{chord} fired with no active mapping, ignoring");
            return None;
        };
        Some(self.fire(&mapping))
    }

    /// Handle an OS hotkey event id.
    pub fn dispatch_hotkey_id<B: HotkeyBinder>(
        &self,
        registry: &HotkeyRegistry<B>,
        id: u32,
    ) -> Option<DispatchResult> {
        let Some(mapping) = registry.lookup_hotkey_id(id) else {
            info!("hotkey {id} fired with no active mapping, ignoring");
            return None;
        };
        Some(self.fire(&mapping))
    }

    /// Run a mapping's command directly and report the result.
    pub fn fire(&self, mapping: &HotkeyMapping) -> DispatchResult {
        let result = self
            .client
            .invoke(&self.address, &mapping.endpoint, mapping.action);
        self.notifier.notify(&result, mapping);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::mapping::Action;
    use crate::registry::tests::{mapping, FakeBinder};

    /// Relay client that records calls and answers with a fixed result.
    struct FakeRelay {
        calls: RefCell<Vec<(String, String, Action)>>,
        answer: DispatchResult,
    }

    impl FakeRelay {
        fn answering(answer: DispatchResult) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                answer,
            }
        }
    }

    impl RelayClient for FakeRelay {
        fn invoke(&self, address: &DeviceAddress, endpoint: &str, action: Action) -> DispatchResult {
            self.calls
                .borrow_mut()
                .push((address.host.clone(), endpoint.to_string(), action));
            self.answer.clone()
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: RefCell<Vec<(String, bool)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, result: &DispatchResult, mapping: &HotkeyMapping) {
            self.seen
                .borrow_mut()
                .push((mapping.name.clone(), result.is_success()));
        }
    }

    fn chord(s: &str) -> Chord {
        Chord::parse(s).unwrap()
    }

    #[test]
    fn test_dispatch_invokes_mapping_and_notifies() {
        let registry = HotkeyRegistry::new(FakeBinder::default());
        registry.reload(&[
            HotkeyMapping::new("Lamp", "Ctrl+Alt+L", "relay/0", Action::Toggle),
            HotkeyMapping::new("Fan", "Ctrl+Alt+F", "relay/1", Action::Off),
        ]);
        let dispatcher = Dispatcher::new(
            FakeRelay::answering(DispatchResult::Success { status: 200 }),
            RecordingNotifier::default(),
            DeviceAddress::new("192.0.2.10"),
        );

        let result = dispatcher.dispatch(&registry, &chord("ctrl+alt+f"));
        assert_eq!(result, Some(DispatchResult::Success { status: 200 }));
        assert_eq!(
            *dispatcher.client.calls.borrow(),
            vec![("192.0.2.10".to_string(), "relay/1".to_string(), Action::Off)]
        );
        assert_eq!(
            *dispatcher.notifier().seen.borrow(),
            vec![("Fan".to_string(), true)]
        );
    }

    #[test]
    fn test_dispatch_by_hotkey_id() {
        let registry = HotkeyRegistry::new(FakeBinder::default());
        registry.reload(&[mapping("Lamp", "Ctrl+Alt+L")]);
        let dispatcher = Dispatcher::new(
            FakeRelay::answering(DispatchResult::Success { status: 200 }),
            RecordingNotifier::default(),
            DeviceAddress::new("192.0.2.10"),
        );

        let id = chord("Ctrl+Alt+L").hotkey_id();
        assert!(dispatcher.dispatch_hotkey_id(&registry, id).is_some());
        assert_eq!(dispatcher.client.calls.borrow().len(), 1);
    }

    #[test]
    fn test_unknown_chord_is_a_no_op() {
        let registry = HotkeyRegistry::new(FakeBinder::default());
        registry.reload(&[mapping("Lamp", "Ctrl+Alt+L")]);
        let dispatcher = Dispatcher::new(
            FakeRelay::answering(DispatchResult::Success { status: 200 }),
            RecordingNotifier::default(),
            DeviceAddress::new("192.0.2.10"),
        );

        assert_eq!(dispatcher.dispatch(&registry, &chord("Ctrl+Alt+Z")), None);
        assert!(dispatcher.client.calls.borrow().is_empty());
        assert!(dispatcher.notifier().seen.borrow().is_empty());
    }

    #[test]
    fn test_failure_is_reported_not_raised() {
        let registry = HotkeyRegistry::new(FakeBinder::default());
        registry.reload(&[mapping("Lamp", "Ctrl+Alt+L")]);
        let dispatcher = Dispatcher::new(
            FakeRelay::answering(DispatchResult::Failure(DispatchError::Timeout)),
            RecordingNotifier::default(),
            DeviceAddress::new("192.0.2.10"),
        );

        let result = dispatcher.dispatch(&registry, &chord("Ctrl+Alt+L")).unwrap();
        assert_eq!(result.error(), Some(&DispatchError::Timeout));
        assert_eq!(
            *dispatcher.notifier().seen.borrow(),
            vec![("Lamp".to_string(), false)]
        );

        // The next key press is still handled.
        assert!(dispatcher.dispatch(&registry, &chord("Ctrl+Alt+L")).is_some());
        assert_eq!(dispatcher.client.calls.borrow().len(), 2);
    }

    #[test]
    fn test_address_change_applies_to_next_dispatch() {
        let registry = HotkeyRegistry::new(FakeBinder::default());
        registry.reload(&[mapping("Lamp", "Ctrl+Alt+L")]);
        let mut dispatcher = Dispatcher::new(
            FakeRelay::answering(DispatchResult::Success { status: 200 }),
            LogNotifier,
            DeviceAddress::new("192.0.2.10"),
        );

        dispatcher.set_address(DeviceAddress::new("192.0.2.20"));
        dispatcher.dispatch(&registry, &chord("Ctrl+Alt+L"));
        assert_eq!(dispatcher.client.calls.borrow()[0].0, "192.0.2.20");
    }

    #[test]
    fn test_describe() {
        let m = HotkeyMapping::new("Lamp", "Ctrl+Alt+L", "relay/0", Action::Toggle);
        assert_eq!(
            describe(&DispatchResult::Success { status: 200 }, &m),
            "Lamp: switched relay/0 (toggle)"
        );
        assert_eq!(
            describe(&DispatchResult::Failure(DispatchError::HttpError(500)), &m),
            "Lamp: error: status code 500"
        );
        assert_eq!(
            describe(&DispatchResult::Failure(DispatchError::Timeout), &m),
            "Lamp: failed: request timed out"
        );
    }
}
