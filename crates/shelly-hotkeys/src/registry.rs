//! The set of hotkey mappings currently bound with the OS.
//!
//! Readers take a cheap snapshot (`Arc<ActiveSet>`) and never block on a
//! writer for longer than the pointer swap. Writers (`register`,
//! `unregister`, `reload`, `release_all`) are serialized; each builds the
//! next set off to the side and publishes it in one step, so a dispatch that
//! races a reload sees either the old set or the new one, never a mix.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::binder::HotkeyBinder;
use crate::chord::Chord;
use crate::error::RegistrationError;
use crate::mapping::HotkeyMapping;

/// Proof of a successful registration, used to release it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationHandle {
    id: u64,
    chord: Chord,
}

impl RegistrationHandle {
    pub fn chord(&self) -> &Chord {
        &self.chord
    }
}

/// Where a mapping ended up after a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingState {
    Active,
    Inactive(RegistrationError),
}

impl MappingState {
    pub fn is_active(&self) -> bool {
        matches!(self, MappingState::Active)
    }
}

#[derive(Debug, Clone)]
pub struct ActiveBinding {
    pub handle: RegistrationHandle,
    pub mapping: HotkeyMapping,
}

/// Immutable view of the bound mappings, keyed by normalized chord.
#[derive(Debug, Clone, Default)]
pub struct ActiveSet {
    by_chord: HashMap<Chord, ActiveBinding>,
    by_hotkey_id: HashMap<u32, Chord>,
}

impl ActiveSet {
    pub fn get(&self, chord: &Chord) -> Option<&ActiveBinding> {
        self.by_chord.get(chord)
    }

    /// Resolve the id carried by an OS hotkey event.
    pub fn get_by_hotkey_id(&self, id: u32) -> Option<&ActiveBinding> {
        self.by_hotkey_id
            .get(&id)
            .and_then(|chord| self.by_chord.get(chord))
    }

    pub fn contains(&self, chord: &Chord) -> bool {
        self.by_chord.contains_key(chord)
    }

    pub fn len(&self) -> usize {
        self.by_chord.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_chord.is_empty()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &ActiveBinding> {
        self.by_chord.values()
    }

    fn insert(&mut self, binding: ActiveBinding) {
        let chord = binding.handle.chord;
        self.by_hotkey_id.insert(chord.hotkey_id(), chord);
        self.by_chord.insert(chord, binding);
    }

    fn remove(&mut self, chord: &Chord) -> Option<ActiveBinding> {
        self.by_hotkey_id.remove(&chord.hotkey_id());
        self.by_chord.remove(chord)
    }
}

/// Per-mapping outcome of a [`HotkeyRegistry::reload`], in input order.
#[derive(Debug, Clone, Default)]
pub struct ReloadReport {
    pub states: Vec<(HotkeyMapping, MappingState)>,
}

impl ReloadReport {
    /// The mappings that could not be bound, with the reason.
    pub fn inactive(&self) -> impl Iterator<Item = (&HotkeyMapping, &RegistrationError)> {
        self.states.iter().filter_map(|(m, s)| match s {
            MappingState::Inactive(e) => Some((m, e)),
            MappingState::Active => None,
        })
    }

    pub fn active_count(&self) -> usize {
        self.states.iter().filter(|(_, s)| s.is_active()).count()
    }
}

/// Owns the OS bindings for a set of mappings.
///
/// Bindings are released by [`release_all`](Self::release_all) and when the
/// registry is dropped.
pub struct HotkeyRegistry<B: HotkeyBinder> {
    binder: B,
    active: RwLock<Arc<ActiveSet>>,
    writer: Mutex<()>,
    next_handle: AtomicU64,
}

impl<B: HotkeyBinder> HotkeyRegistry<B> {
    pub fn new(binder: B) -> Self {
        Self {
            binder,
            active: RwLock::new(Arc::new(ActiveSet::default())),
            writer: Mutex::new(()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// The current active set. Later writes do not affect the snapshot.
    pub fn snapshot(&self) -> Arc<ActiveSet> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lookup(&self, chord: &Chord) -> Option<HotkeyMapping> {
        self.snapshot().get(chord).map(|b| b.mapping.clone())
    }

    pub fn lookup_hotkey_id(&self, id: u32) -> Option<HotkeyMapping> {
        self.snapshot()
            .get_by_hotkey_id(id)
            .map(|b| b.mapping.clone())
    }

    /// Bind one mapping.
    ///
    /// Fails with `InvalidCombination` if the chord does not parse and with
    /// `AlreadyBound` if another active mapping or another process holds it.
    pub fn register(
        &self,
        mapping: &HotkeyMapping,
    ) -> Result<RegistrationHandle, RegistrationError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = ActiveSet::clone(&self.snapshot());
        let handle = self.bind_into(&mut next, mapping)?;
        self.publish(next);
        Ok(handle)
    }

    /// Release a registration. Unknown or already released handles are
    /// ignored.
    pub fn unregister(&self, handle: &RegistrationHandle) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        match current.get(&handle.chord) {
            Some(binding) if binding.handle == *handle => {}
            _ => {
                debug!("unregister of {} ignored, not active", handle.chord);
                return;
            }
        }

        self.unbind_logged(&handle.chord);
        let mut next = ActiveSet::clone(&current);
        next.remove(&handle.chord);
        self.publish(next);
    }

    /// Replace every binding with `mappings`, registered in order.
    ///
    /// Failures are recorded per mapping and do not stop the remaining
    /// registrations. When two mappings share a chord the first one wins.
    pub fn reload(&self, mappings: &[HotkeyMapping]) -> ReloadReport {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        for binding in self.snapshot().bindings() {
            self.unbind_logged(&binding.handle.chord);
        }

        let mut next = ActiveSet::default();
        let mut report = ReloadReport::default();
        for mapping in mappings {
            let state = match self.bind_into(&mut next, mapping) {
                Ok(_) => MappingState::Active,
                Err(e) => {
                    warn!("hotkey {:?} ({}) is inactive: {e}", mapping.name, mapping.hotkey);
                    MappingState::Inactive(e)
                }
            };
            report.states.push((mapping.clone(), state));
        }
        self.publish(next);

        info!(
            "loaded {} of {} hotkeys",
            report.active_count(),
            report.states.len()
        );
        report
    }

    /// Release every OS binding.
    pub fn release_all(&self) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        if current.is_empty() {
            return;
        }
        for binding in current.bindings() {
            self.unbind_logged(&binding.handle.chord);
        }
        self.publish(ActiveSet::default());
        debug!("released {} hotkeys", current.len());
    }

    fn bind_into(
        &self,
        set: &mut ActiveSet,
        mapping: &HotkeyMapping,
    ) -> Result<RegistrationHandle, RegistrationError> {
        let chord = mapping.chord()?;
        if let Some(existing) = set.get(&chord) {
            return Err(RegistrationError::AlreadyBound(format!(
                "{chord} (used by {:?})",
                existing.mapping.name
            )));
        }
        self.binder.bind(&chord)?;

        let handle = RegistrationHandle {
            id: self.next_handle.fetch_add(1, Ordering::Relaxed),
            chord,
        };
        set.insert(ActiveBinding {
            handle: handle.clone(),
            mapping: mapping.clone(),
        });
        debug!("bound {chord} to {:?}", mapping.name);
        Ok(handle)
    }

    fn unbind_logged(&self, chord: &Chord) {
        if let Err(e) = self.binder.unbind(chord) {
            warn!("failed to release {chord}: {e}");
        }
    }

    fn publish(&self, next: ActiveSet) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }
}

impl<B: HotkeyBinder> Drop for HotkeyRegistry<B> {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::mapping::Action;

    #[derive(Default)]
    struct FakeState {
        bound: HashSet<Chord>,
        foreign: HashSet<Chord>,
        unbind_calls: usize,
    }

    /// In-memory binder. Clones share state so a test can inspect it after
    /// handing one to a registry.
    #[derive(Clone, Default)]
    pub(crate) struct FakeBinder {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeBinder {
        /// Simulate another application holding `chord`.
        pub(crate) fn claim_elsewhere(&self, chord: &str) {
            let chord = Chord::parse(chord).unwrap();
            self.state.lock().unwrap().foreign.insert(chord);
        }

        pub(crate) fn release_elsewhere(&self, chord: &str) {
            let chord = Chord::parse(chord).unwrap();
            self.state.lock().unwrap().foreign.remove(&chord);
        }

        pub(crate) fn is_bound(&self, chord: &str) -> bool {
            let chord = Chord::parse(chord).unwrap();
            self.state.lock().unwrap().bound.contains(&chord)
        }

        pub(crate) fn bound_count(&self) -> usize {
            self.state.lock().unwrap().bound.len()
        }

        fn unbind_calls(&self) -> usize {
            self.state.lock().unwrap().unbind_calls
        }
    }

    impl HotkeyBinder for FakeBinder {
        fn bind(&self, chord: &Chord) -> Result<(), RegistrationError> {
            let mut state = self.state.lock().unwrap();
            if state.foreign.contains(chord) || !state.bound.insert(*chord) {
                return Err(RegistrationError::AlreadyBound(chord.to_string()));
            }
            Ok(())
        }

        fn unbind(&self, chord: &Chord) -> Result<(), RegistrationError> {
            let mut state = self.state.lock().unwrap();
            state.unbind_calls += 1;
            state.bound.remove(chord);
            Ok(())
        }
    }

    pub(crate) fn mapping(name: &str, hotkey: &str) -> HotkeyMapping {
        HotkeyMapping::new(name, hotkey, "relay/0", Action::Toggle)
    }

    fn chord(s: &str) -> Chord {
        Chord::parse(s).unwrap()
    }

    #[test]
    fn test_reload_then_lookup_round_trips() {
        let registry = HotkeyRegistry::new(FakeBinder::default());
        let mappings = vec![
            mapping("Lamp", "Ctrl+Alt+L"),
            mapping("Fan", "Ctrl+Alt+F"),
            mapping("Heater", "Super+Shift+H"),
        ];

        let report = registry.reload(&mappings);
        assert_eq!(report.active_count(), 3);
        assert_eq!(report.inactive().count(), 0);

        for m in &mappings {
            assert_eq!(registry.lookup(&m.chord().unwrap()).as_ref(), Some(m));
            assert_eq!(
                registry.lookup_hotkey_id(m.chord().unwrap().hotkey_id()).as_ref(),
                Some(m)
            );
        }
        // Lookup is by normalized chord, not by spelling.
        assert_eq!(
            registry.lookup(&chord("alt+control+l")).unwrap().name,
            "Lamp"
        );
        assert_eq!(registry.lookup(&chord("Ctrl+Alt+X")), None);
    }

    #[test]
    fn test_register_same_chord_twice() {
        let binder = FakeBinder::default();
        let registry = HotkeyRegistry::new(binder.clone());

        registry.register(&mapping("Lamp", "Ctrl+Alt+L")).unwrap();
        let err = registry
            .register(&mapping("Other", "alt+ctrl+l"))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AlreadyBound(_)));
        assert_eq!(registry.lookup(&chord("Ctrl+Alt+L")).unwrap().name, "Lamp");
        assert_eq!(binder.bound_count(), 1);
    }

    #[test]
    fn test_register_invalid_and_foreign() {
        let binder = FakeBinder::default();
        binder.claim_elsewhere("Ctrl+Shift+Q");
        let registry = HotkeyRegistry::new(binder);

        assert!(matches!(
            registry.register(&mapping("Bad", "Ctrl+Hyper+Q")),
            Err(RegistrationError::InvalidCombination(_))
        ));
        assert!(matches!(
            registry.register(&mapping("Taken", "Ctrl+Shift+Q")),
            Err(RegistrationError::AlreadyBound(_))
        ));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let binder = FakeBinder::default();
        let registry = HotkeyRegistry::new(binder.clone());

        let handle = registry.register(&mapping("Lamp", "Ctrl+Alt+L")).unwrap();
        assert!(binder.is_bound("Ctrl+Alt+L"));

        registry.unregister(&handle);
        assert!(!binder.is_bound("Ctrl+Alt+L"));
        assert_eq!(registry.lookup(handle.chord()), None);
        assert_eq!(binder.unbind_calls(), 1);

        registry.unregister(&handle);
        assert_eq!(binder.unbind_calls(), 1);
    }

    #[test]
    fn test_stale_handle_does_not_release_new_binding() {
        let binder = FakeBinder::default();
        let registry = HotkeyRegistry::new(binder.clone());

        let old = registry.register(&mapping("Lamp", "Ctrl+Alt+L")).unwrap();
        registry.unregister(&old);
        registry.register(&mapping("Lamp again", "Ctrl+Alt+L")).unwrap();

        registry.unregister(&old);
        assert!(binder.is_bound("Ctrl+Alt+L"));
        assert_eq!(
            registry.lookup(&chord("Ctrl+Alt+L")).unwrap().name,
            "Lamp again"
        );
    }

    #[test]
    fn test_reload_duplicate_first_wins() {
        let registry = HotkeyRegistry::new(FakeBinder::default());
        let report = registry.reload(&[
            mapping("First", "Ctrl+Alt+L"),
            mapping("Second", "ctrl+alt+l"),
        ]);

        assert_eq!(report.active_count(), 1);
        let inactive: Vec<_> = report.inactive().collect();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].0.name, "Second");
        assert!(matches!(inactive[0].1, RegistrationError::AlreadyBound(_)));
        assert_eq!(registry.lookup(&chord("Ctrl+Alt+L")).unwrap().name, "First");
    }

    #[test]
    fn test_reload_partial_failure_keeps_going() {
        let binder = FakeBinder::default();
        binder.claim_elsewhere("Ctrl+Alt+F");
        let registry = HotkeyRegistry::new(binder.clone());

        let report = registry.reload(&[
            mapping("Broken", "Ctrl+Alt+"),
            mapping("Taken", "Ctrl+Alt+F"),
            mapping("Lamp", "Ctrl+Alt+L"),
        ]);

        let states: Vec<_> = report.states.iter().map(|(_, s)| s.clone()).collect();
        assert!(matches!(
            states[0],
            MappingState::Inactive(RegistrationError::InvalidCombination(_))
        ));
        assert!(matches!(
            states[1],
            MappingState::Inactive(RegistrationError::AlreadyBound(_))
        ));
        assert_eq!(states[2], MappingState::Active);
        assert_eq!(report.states.len(), 3);

        // Inactive mappings come back on a later reload once the chord frees up.
        binder.release_elsewhere("Ctrl+Alt+F");
        let mappings: Vec<_> = report.states.into_iter().map(|(m, _)| m).collect();
        let report = registry.reload(&mappings);
        assert_eq!(report.active_count(), 2);
        assert_eq!(registry.lookup(&chord("Ctrl+Alt+F")).unwrap().name, "Taken");
    }

    #[test]
    fn test_reload_releases_previous_bindings() {
        let binder = FakeBinder::default();
        let registry = HotkeyRegistry::new(binder.clone());

        registry.reload(&[mapping("Lamp", "Ctrl+Alt+L"), mapping("Fan", "Ctrl+Alt+F")]);
        registry.reload(&[mapping("Fan", "Ctrl+Alt+F")]);

        assert!(!binder.is_bound("Ctrl+Alt+L"));
        assert!(binder.is_bound("Ctrl+Alt+F"));
        assert_eq!(registry.lookup(&chord("Ctrl+Alt+L")), None);
        assert_eq!(binder.bound_count(), 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_reload() {
        let registry = HotkeyRegistry::new(FakeBinder::default());
        registry.reload(&[mapping("Lamp", "Ctrl+Alt+L")]);

        let before = registry.snapshot();
        registry.reload(&[mapping("Fan", "Ctrl+Alt+F"), mapping("Heater", "Ctrl+Alt+H")]);

        assert_eq!(before.len(), 1);
        assert!(before.contains(&chord("Ctrl+Alt+L")));
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn test_drop_releases_everything() {
        let binder = FakeBinder::default();
        {
            let registry = HotkeyRegistry::new(binder.clone());
            registry.reload(&[mapping("Lamp", "Ctrl+Alt+L"), mapping("Fan", "Ctrl+Alt+F")]);
            assert_eq!(binder.bound_count(), 2);
        }
        assert_eq!(binder.bound_count(), 0);
    }
}
