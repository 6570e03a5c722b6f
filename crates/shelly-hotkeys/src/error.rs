use std::path::PathBuf;

use thiserror::Error;

/// Why a mapping could not be bound to a global hotkey.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The chord is already claimed, by another process or by another active
    /// mapping in the same registry.
    #[error("hotkey {0} is already bound")]
    AlreadyBound(String),

    /// The chord string could not be parsed into a key combination.
    #[error("invalid key combination: {0}")]
    InvalidCombination(String),

    /// The OS rejected the operation for a reason other than a conflict.
    #[error("hotkey backend error: {0}")]
    Platform(String),
}

impl From<global_hotkey::Error> for RegistrationError {
    fn from(err: global_hotkey::Error) -> Self {
        match err {
            global_hotkey::Error::AlreadyRegistered(hotkey) => {
                RegistrationError::AlreadyBound(format!("{hotkey:?}"))
            }
            global_hotkey::Error::FailedToRegister(reason) => {
                RegistrationError::AlreadyBound(format!("{reason:?}"))
            }
            other => RegistrationError::Platform(other.to_string()),
        }
    }
}

/// Why a device call did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The device could not be reached (refused, unroutable, DNS failure).
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The device accepted the connection but did not answer in time.
    #[error("request timed out")]
    Timeout,

    /// The device answered with a non-2xx status.
    #[error("status code {0}")]
    HttpError(u16),

    /// The device answered, but the body was not what was asked for.
    #[error("unexpected response from device: {0}")]
    UnexpectedResponse(String),

    /// The host or endpoint does not form a valid request URL.
    #[error("malformed device address: {0}")]
    MalformedAddress(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            DispatchError::MalformedAddress(err.to_string())
        } else if err.is_connect() {
            DispatchError::Unreachable(err.to_string())
        } else if err.is_timeout() {
            DispatchError::Timeout
        } else if let Some(status) = err.status() {
            DispatchError::HttpError(status.as_u16())
        } else {
            DispatchError::Unreachable(err.to_string())
        }
    }
}

/// Errors reading or writing the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No settings file exists at the given path.
    #[error("settings file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The settings file exists but is not valid.
    #[error("failed to parse {}: {reason}", .path.display())]
    ParseFailure { path: PathBuf, reason: String },

    /// The platform config directory could not be determined.
    #[error("could not determine the settings directory")]
    NoConfigDir,

    #[error("settings IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(String),
}

impl From<ron::Error> for ConfigError {
    fn from(err: ron::Error) -> Self {
        ConfigError::Serialize(err.to_string())
    }
}

/// Errors applying the start-with-system setting.
#[derive(Error, Debug)]
pub enum AutostartError {
    #[error("executable path is not valid UTF-8: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("failed to update the autostart entry: {0}")]
    Launcher(#[from] auto_launch::Error),

    #[error("autostart IO error: {0}")]
    Io(#[from] std::io::Error),
}
