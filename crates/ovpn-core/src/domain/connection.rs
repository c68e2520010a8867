//! Connection status and the authoritative connection record.
//!
//! The daemon owns exactly one [`ConnectionRecord`].  Everything else only ever
//! sees a [`Snapshot`]: an immutable copy taken after a command completed.
//!
//! # Status lifecycle
//!
//! ```text
//! Disconnected  ◄──►  Connected
//! ```
//!
//! Both states are reachable from either one without guards; the simulated
//! tunnel cannot fail in a way that needs an intermediate state.
//! [`ConnectionStatus::Connecting`] exists for UI surfaces that want to render
//! an in-flight connect request; the record itself never holds it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::config::ParsedConfig;

/// Whether the tunnel is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    /// Shown by a UI surface while its connect request is in flight.
    Connecting,
    Connected,
}

impl ConnectionStatus {
    /// Maps the wire-level `connected` flag back to a status.
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    pub fn is_connected(self) -> bool {
        self == ConnectionStatus::Connected
    }

    /// Human-readable label, e.g. for a status line.
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The single authoritative state.  Only the config half is ever persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub status: ConnectionStatus,
    pub active_config: Option<ParsedConfig>,
}

impl ConnectionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes an immutable copy for read-only consumers.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status,
            config: self.active_config.clone(),
        }
    }
}

/// Immutable copy of `{status, config-or-none}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub status: ConnectionStatus,
    pub config: Option<ParsedConfig>,
}

impl Snapshot {
    pub fn connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Raw text of the active configuration, if any.
    pub fn raw_config(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.raw.as_str())
    }
}
