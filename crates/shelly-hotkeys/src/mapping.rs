use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::chord::Chord;
use crate::error::{DispatchError, RegistrationError};

/// What a mapping asks the relay to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Toggle,
    On,
    Off,
}

impl Action {
    /// The value of the relay's `turn` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Toggle => "toggle",
            Action::On => "on",
            Action::Off => "off",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "toggle" => Ok(Action::Toggle),
            "on" => Ok(Action::On),
            "off" => Ok(Action::Off),
            other => Err(format!("unknown action {other:?} (expected toggle, on or off)")),
        }
    }
}

/// A named binding from a key combination to a relay command.
///
/// The chord is kept as the user wrote it so that a mapping with an
/// unparseable chord survives a load/save cycle; it is parsed when the
/// mapping is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyMapping {
    pub name: String,
    pub hotkey: String,
    pub endpoint: String,
    pub action: Action,
}

impl HotkeyMapping {
    pub fn new(
        name: impl Into<String>,
        hotkey: impl Into<String>,
        endpoint: impl Into<String>,
        action: Action,
    ) -> Self {
        Self {
            name: name.into(),
            hotkey: hotkey.into(),
            endpoint: endpoint.into(),
            action,
        }
    }

    pub fn chord(&self) -> Result<Chord, RegistrationError> {
        Chord::parse(&self.hotkey)
    }

    /// Label used in menus and listings.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.action)
    }
}

/// The device every call goes to: an IP or hostname, optionally with a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress {
    pub host: String,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// `http://{host}/`, or `MalformedAddress` when the host is not usable.
    pub fn base_url(&self) -> Result<Url, DispatchError> {
        let host = self.host.trim();
        let malformed = |why: &str| DispatchError::MalformedAddress(format!("{host:?}: {why}"));

        if host.is_empty() {
            return Err(malformed("empty host"));
        }
        if host.contains(['/', '?', '#', '@']) || host.contains(char::is_whitespace) {
            return Err(malformed("expected a bare host or host:port"));
        }

        let url =
            Url::parse(&format!("http://{host}/")).map_err(|e| malformed(&e.to_string()))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(malformed("missing host"));
        }
        Ok(url)
    }

    /// The URL for a relay endpoint such as `relay/0`, without a query.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, DispatchError> {
        let base = self.base_url()?;
        let path = endpoint.trim().trim_matches('/');
        if path.contains(['?', '#']) || path.contains("://") || path.contains(char::is_whitespace) {
            return Err(DispatchError::MalformedAddress(format!(
                "{endpoint:?}: not a relay path"
            )));
        }
        base.join(path)
            .map_err(|e| DispatchError::MalformedAddress(format!("{endpoint:?}: {e}")))
    }

    /// The command URL: `http://{host}/{endpoint}?turn={action}`.
    pub fn command_url(&self, endpoint: &str, action: Action) -> Result<Url, DispatchError> {
        let mut url = self.endpoint_url(endpoint)?;
        url.query_pairs_mut().append_pair("turn", action.as_str());
        Ok(url)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}
