use std::fmt;
use std::str::FromStr;

use global_hotkey::hotkey::{Code, HotKey, Modifiers};

use crate::error::RegistrationError;

/// A normalized key combination: a set of modifiers plus one key.
///
/// Two chords are equal when they press the same keys, regardless of how the
/// user spelled them: `"Ctrl+Alt+L"`, `"alt + control + l"` and `"CTRL+ALT+l"`
/// all parse to the same value and hash to the same registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub modifiers: Modifiers,
    pub code: Code,
}

/// Accepted spellings for each modifier.
const MODIFIER_NAMES: &[(&str, Modifiers)] = &[
    ("ctrl", Modifiers::CONTROL),
    ("control", Modifiers::CONTROL),
    ("alt", Modifiers::ALT),
    ("option", Modifiers::ALT),
    ("shift", Modifiers::SHIFT),
    ("super", Modifiers::SUPER),
    ("meta", Modifiers::SUPER),
    ("cmd", Modifiers::SUPER),
    ("command", Modifiers::SUPER),
    ("win", Modifiers::SUPER),
    ("windows", Modifiers::SUPER),
];

/// Canonical key names. The first name listed for a code is the one used
/// when formatting.
const KEY_NAMES: &[(&str, Code)] = &[
    ("A", Code::KeyA),
    ("B", Code::KeyB),
    ("C", Code::KeyC),
    ("D", Code::KeyD),
    ("E", Code::KeyE),
    ("F", Code::KeyF),
    ("G", Code::KeyG),
    ("H", Code::KeyH),
    ("I", Code::KeyI),
    ("J", Code::KeyJ),
    ("K", Code::KeyK),
    ("L", Code::KeyL),
    ("M", Code::KeyM),
    ("N", Code::KeyN),
    ("O", Code::KeyO),
    ("P", Code::KeyP),
    ("Q", Code::KeyQ),
    ("R", Code::KeyR),
    ("S", Code::KeyS),
    ("T", Code::KeyT),
    ("U", Code::KeyU),
    ("V", Code::KeyV),
    ("W", Code::KeyW),
    ("X", Code::KeyX),
    ("Y", Code::KeyY),
    ("Z", Code::KeyZ),
    ("0", Code::Digit0),
    ("1", Code::Digit1),
    ("2", Code::Digit2),
    ("3", Code::Digit3),
    ("4", Code::Digit4),
    ("5", Code::Digit5),
    ("6", Code::Digit6),
    ("7", Code::Digit7),
    ("8", Code::Digit8),
    ("9", Code::Digit9),
    ("F1", Code::F1),
    ("F2", Code::F2),
    ("F3", Code::F3),
    ("F4", Code::F4),
    ("F5", Code::F5),
    ("F6", Code::F6),
    ("F7", Code::F7),
    ("F8", Code::F8),
    ("F9", Code::F9),
    ("F10", Code::F10),
    ("F11", Code::F11),
    ("F12", Code::F12),
    ("Num0", Code::Numpad0),
    ("Num1", Code::Numpad1),
    ("Num2", Code::Numpad2),
    ("Num3", Code::Numpad3),
    ("Num4", Code::Numpad4),
    ("Num5", Code::Numpad5),
    ("Num6", Code::Numpad6),
    ("Num7", Code::Numpad7),
    ("Num8", Code::Numpad8),
    ("Num9", Code::Numpad9),
    ("Esc", Code::Escape),
    ("Escape", Code::Escape),
    ("Space", Code::Space),
    ("Enter", Code::Enter),
    ("Return", Code::Enter),
    ("Tab", Code::Tab),
    ("Backspace", Code::Backspace),
    ("Del", Code::Delete),
    ("Delete", Code::Delete),
    ("Ins", Code::Insert),
    ("Insert", Code::Insert),
    ("Home", Code::Home),
    ("End", Code::End),
    ("PgUp", Code::PageUp),
    ("PageUp", Code::PageUp),
    ("PgDown", Code::PageDown),
    ("PageDown", Code::PageDown),
    ("Left", Code::ArrowLeft),
    ("Right", Code::ArrowRight),
    ("Up", Code::ArrowUp),
    ("Down", Code::ArrowDown),
    ("Pause", Code::Pause),
    ("Print", Code::PrintScreen),
    ("-", Code::Minus),
    ("=", Code::Equal),
    ("[", Code::BracketLeft),
    ("]", Code::BracketRight),
    ("\\", Code::Backslash),
    (";", Code::Semicolon),
    ("'", Code::Quote),
    (",", Code::Comma),
    (".", Code::Period),
    ("/", Code::Slash),
    ("`", Code::Backquote),
];

impl Chord {
    pub fn new(modifiers: Modifiers, code: Code) -> Self {
        Chord { modifiers, code }
    }

    /// Parse a chord such as `"Ctrl+Alt+L"`.
    ///
    /// Modifier and key names are case-insensitive and may be separated by
    /// whitespace. Exactly one non-modifier key is required, and it must come
    /// last. A repeated modifier is tolerated.
    pub fn parse(s: &str) -> Result<Self, RegistrationError> {
        let invalid = |why: &str| RegistrationError::InvalidCombination(format!("{s:?}: {why}"));

        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((key, mods)) = parts.split_last() else {
            return Err(invalid("empty"));
        };
        if key.is_empty() {
            return Err(invalid("missing key"));
        }

        let mut modifiers = Modifiers::empty();
        for part in mods {
            match lookup_modifier(part) {
                Some(m) => modifiers |= m,
                None if part.is_empty() => return Err(invalid("empty segment")),
                None => return Err(invalid(&format!("unknown modifier {part:?}"))),
            }
        }

        if lookup_modifier(key).is_some() {
            return Err(invalid("a chord needs a non-modifier key"));
        }
        let code = lookup_code(key).ok_or_else(|| invalid(&format!("unknown key {key:?}")))?;

        Ok(Chord { modifiers, code })
    }

    /// The OS-level hotkey for this chord.
    pub fn to_hotkey(&self) -> HotKey {
        let mods = if self.modifiers.is_empty() {
            None
        } else {
            Some(self.modifiers)
        };
        HotKey::new(mods, self.code)
    }

    /// The id the global hotkey backend reports when this chord fires.
    pub fn hotkey_id(&self) -> u32 {
        self.to_hotkey().id()
    }
}

fn lookup_modifier(name: &str) -> Option<Modifiers> {
    MODIFIER_NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, m)| *m)
}

fn lookup_code(name: &str) -> Option<Code> {
    KEY_NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, c)| *c)
}

fn code_name(code: Code) -> Option<&'static str> {
    KEY_NAMES.iter().find(|(_, c)| *c == code).map(|(n, _)| *n)
}

impl From<&HotKey> for Chord {
    fn from(hotkey: &HotKey) -> Self {
        Chord::new(hotkey.mods, hotkey.key)
    }
}

impl FromStr for Chord {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chord::parse(s)
    }
}

/// Formats in the canonical `Ctrl+Alt+Shift+Super+Key` order.
impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (Modifiers::CONTROL, "Ctrl"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::SHIFT, "Shift"),
            (Modifiers::SUPER, "Super"),
        ] {
            if self.modifiers.contains(flag) {
                write!(f, "{name}+")?;
            }
        }
        match code_name(self.code) {
            Some(name) => f.write_str(name),
            None => write!(f, "{:?}", self.code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modifiers_and_key() {
        let chord = Chord::parse("Ctrl+Alt+L").unwrap();
        assert_eq!(chord.code, Code::KeyL);
        assert_eq!(chord.modifiers, Modifiers::CONTROL | Modifiers::ALT);

        let chord = Chord::parse("F9").unwrap();
        assert_eq!(chord.code, Code::F9);
        assert!(chord.modifiers.is_empty());
    }

    #[test]
    fn test_spellings_normalize_to_same_chord() {
        let a = Chord::parse("Ctrl+Alt+L").unwrap();
        let b = Chord::parse("alt + control + l").unwrap();
        let c = Chord::parse("CTRL+option+L").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.hotkey_id(), c.hotkey_id());

        assert_eq!(
            Chord::parse("cmd+space").unwrap(),
            Chord::parse("win+Space").unwrap()
        );
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(Chord::parse("alt+ctrl+l").unwrap().to_string(), "Ctrl+Alt+L");
        assert_eq!(
            Chord::parse("shift+meta+pgup").unwrap().to_string(),
            "Shift+Super+PgUp"
        );
        assert_eq!(Chord::parse("ctrl+/").unwrap().to_string(), "Ctrl+/");
        // Display output parses back to the same chord.
        let chord = Chord::parse("super+shift+F12").unwrap();
        assert_eq!(Chord::parse(&chord.to_string()).unwrap(), chord);
    }

    #[test]
    fn test_to_hotkey() {
        let hotkey = Chord::parse("ctrl+shift+n").unwrap().to_hotkey();
        assert_eq!(hotkey.mods, Modifiers::CONTROL | Modifiers::SHIFT);
        assert_eq!(hotkey.key, Code::KeyN);
        assert_eq!(Chord::from(&hotkey), Chord::parse("shift+ctrl+n").unwrap());
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "ctrl+", "+a", "hyper+a", "ctrl+nope", "ctrl+alt", "ctrl++a"] {
            let err = Chord::parse(bad).unwrap_err();
            assert!(
                matches!(err, RegistrationError::InvalidCombination(_)),
                "{bad:?} gave {err:?}"
            );
        }
    }
}
