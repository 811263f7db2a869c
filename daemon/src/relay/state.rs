//! Relay connection state and configuration.

use std::fmt;
use std::time::Duration;

use crate::error::Error;

/// Default fixed delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayConnectionState {
    /// Enabled, waiting out the reconnect delay.
    Disconnected,
    /// Opening the socket.
    Connecting,
    Connected,
    /// Sharing is off or the host is missing; no socket is held.
    Disabled,
}

impl fmt::Display for RelayConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelayConnectionState::Disconnected => "disconnected",
            RelayConnectionState::Connecting => "connecting",
            RelayConnectionState::Connected => "connected",
            RelayConnectionState::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

/// Settings the relay runs with. Supplied from outside; replacing them tears
/// down any live socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub enabled: bool,
    pub host: String,
    pub reconnect_delay: Duration,
    pub group_key: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            group_key: String::new(),
        }
    }
}

impl RelayConfig {
    /// True when the relay should hold a connection.
    pub fn wants_connection(&self) -> bool {
        self.enabled && !self.host.trim().is_empty()
    }

    /// Reject an enabled config without a host.
    pub fn validate(&self) -> Result<(), Error> {
        if self.enabled && self.host.trim().is_empty() {
            return Err(Error::SharingHostMissing);
        }
        Ok(())
    }
}
