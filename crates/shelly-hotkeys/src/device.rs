//! HTTP client for Shelly relay endpoints.
//!
//! Every call is a single blocking GET with a bounded timeout. There is no
//! retry and no state carried between calls; the caller decides what to do
//! with a failure.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::DispatchError;
use crate::mapping::{Action, DeviceAddress};

/// Default bound on a single device call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Paths tried, in order, by [`DeviceClient::test`].
pub const PROBE_PATHS: &[&str] = &["shelly", "relay/0", ""];

/// The connect bound for an overall call bound of `total`.
pub fn connect_timeout(total: Duration) -> Duration {
    total * 3 / 4
}

/// Outcome of one device call. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// The device answered with a 2xx status.
    Success { status: u16 },
    Failure(DispatchError),
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchResult::Success { .. })
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            DispatchResult::Success { .. } => None,
            DispatchResult::Failure(e) => Some(e),
        }
    }
}

impl From<Result<u16, DispatchError>> for DispatchResult {
    fn from(result: Result<u16, DispatchError>) -> Self {
        match result {
            Ok(status) => DispatchResult::Success { status },
            Err(e) => DispatchResult::Failure(e),
        }
    }
}

/// Relay state as reported by a `GET /relay/N`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayStatus {
    pub ison: bool,
}

/// The device-control seam used by the dispatcher.
pub trait RelayClient {
    /// Send one command to `endpoint` on the device at `address`.
    fn invoke(&self, address: &DeviceAddress, endpoint: &str, action: Action) -> DispatchResult;
}

/// Blocking HTTP client for a Shelly device.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: Client,
    timeout: Duration,
}

impl DeviceClient {
    /// Build a client whose calls give up after `timeout`.
    ///
    /// The timeout covers the whole call. Connecting is bounded by a shorter
    /// [`connect_timeout`] so that a host which never answers fails as
    /// `Unreachable` before the overall bound turns it into `Timeout`.
    pub fn new(timeout: Duration) -> Result<Self, DispatchError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout(timeout))
            .user_agent(concat!("shelly-hotkeys/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `turn={action}` to `endpoint`.
    pub fn invoke(&self, address: &DeviceAddress, endpoint: &str, action: Action) -> DispatchResult {
        address
            .command_url(endpoint, action)
            .and_then(|url| self.get(url))
            .into()
    }

    /// Check that the device answers at all.
    ///
    /// Probes [`PROBE_PATHS`] in order and succeeds on the first 2xx. When
    /// none answers, the failure from the last probe is returned. A malformed
    /// address fails immediately.
    pub fn test(&self, address: &DeviceAddress) -> DispatchResult {
        let mut last = DispatchError::Unreachable("no probe attempted".to_string());
        for path in PROBE_PATHS {
            let url = match address.endpoint_url(path) {
                Ok(url) => url,
                Err(e) => return DispatchResult::Failure(e),
            };
            match self.get(url) {
                Ok(status) => return DispatchResult::Success { status },
                Err(e) => {
                    debug!("probe /{path} failed: {e}");
                    last = e;
                }
            }
        }
        DispatchResult::Failure(last)
    }

    /// Read the on/off state of a relay endpoint.
    pub fn status(&self, address: &DeviceAddress, endpoint: &str) -> Result<RelayStatus, DispatchError> {
        let url = address.endpoint_url(endpoint)?;
        trace!("GET {url}");
        let response = self.http.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::HttpError(status.as_u16()));
        }
        response
            .json::<RelayStatus>()
            .map_err(|e| DispatchError::UnexpectedResponse(e.to_string()))
    }

    fn get(&self, url: Url) -> Result<u16, DispatchError> {
        trace!("GET {url}");
        let status = self.http.get(url).send()?.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(DispatchError::HttpError(status.as_u16()))
        }
    }
}

impl RelayClient for DeviceClient {
    fn invoke(&self, address: &DeviceAddress, endpoint: &str, action: Action) -> DispatchResult {
        DeviceClient::invoke(self, address, endpoint, action)
    }
}
