//! Simulated tunnel.
//!
//! No packets are routed.  "Bringing the tunnel up" means recording the SOCKS5
//! proxy settings that a real tunnel would install, and "tearing it down"
//! clears them.  This is enough for UI surfaces to show a faithful status and
//! for tests to assert which endpoint was chosen.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::application::{ProxySettings, TunnelDriver, TunnelError};

/// In-process tunnel that records the proxy settings it is given.
#[derive(Debug, Default)]
pub struct SimulatedTunnel {
    active: Mutex<Option<ProxySettings>>,
}

impl SimulatedTunnel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The settings currently installed, if the tunnel is up.
    pub fn active(&self) -> Option<ProxySettings> {
        self.active.lock().ok().and_then(|guard| guard.clone())
    }

    fn replace(&self, settings: Option<ProxySettings>) -> Result<Option<ProxySettings>, TunnelError> {
        let mut guard = self
            .active
            .lock()
            .map_err(|_| TunnelError::Unavailable("proxy state lock poisoned".to_string()))?;
        Ok(std::mem::replace(&mut *guard, settings))
    }
}

#[async_trait]
impl TunnelDriver for SimulatedTunnel {
    async fn establish(&self, settings: &ProxySettings) -> Result<(), TunnelError> {
        if settings.host.is_empty() {
            return Err(TunnelError::Rejected("empty proxy host".to_string()));
        }
        self.replace(Some(settings.clone()))?;
        info!(
            scheme = %settings.scheme,
            host = %settings.host,
            port = settings.port,
            "Proxy installed"
        );
        Ok(())
    }

    async fn tear_down(&self) -> Result<(), TunnelError> {
        if self.replace(None)?.is_some() {
            info!("Proxy cleared");
        }
        Ok(())
    }
}
