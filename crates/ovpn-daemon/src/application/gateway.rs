//! RequestGateway: one request in, one response out.
//!
//! The gateway holds no state of its own.  For every [`Request`] it
//!
//! 1. checks the payload shape (a `config` object whose `raw` is a string),
//! 2. delegates to the [`ConnectionStateStore`] and, for connect/disconnect,
//!    to the [`TunnelDriver`],
//! 3. maps the outcome to a [`Response`].
//!
//! # Connect sequence
//!
//! ```text
//! validate payload ─► store.apply_config ─► tunnel.establish(primary) ─► store.set_connected(true)
//!        │                   │                        │
//!        └─ InvalidInput     └─ ParseFailure          └─ TunnelError (status unchanged)
//! ```
//!
//! If the tunnel was already up and fails to come up on the new config, the
//! previous config is applied again so the active config keeps matching the
//! endpoint the tunnel still routes to.
//!
//! Any failure short-circuits into `{"success":false,"error":...}`; a failed
//! connect never reports success.

use std::sync::Arc;

use async_trait::async_trait;
use ovpn_core::{ConfigPayload, ParseFailure, RemoteEndpoint, Request, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::state_store::ConnectionStateStore;

/// Proxy port used when the primary endpoint's port is not numeric.
pub const FALLBACK_PROXY_PORT: u16 = 1080;

// ── Tunnel seam ───────────────────────────────────────────────────────────────

/// What the tunnel is asked to route through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Always `socks5`.
    pub scheme: String,
    /// Primary endpoint host.
    pub host: String,
    /// Primary endpoint port, or [`FALLBACK_PROXY_PORT`].
    pub port: u16,
    /// Hosts that bypass the tunnel.
    pub bypass_list: Vec<String>,
}

impl ProxySettings {
    /// Builds the SOCKS5 settings for `endpoint`.
    pub fn for_endpoint(endpoint: &RemoteEndpoint) -> Self {
        Self {
            scheme: "socks5".to_string(),
            host: endpoint.host.clone(),
            port: endpoint.port.parse().unwrap_or(FALLBACK_PROXY_PORT),
            bypass_list: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }
}

/// Why the tunnel could not be brought up or down.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The driver refused these settings.
    #[error("tunnel rejected proxy settings: {0}")]
    Rejected(String),

    /// The driver could not be reached at all.
    #[error("tunnel is unavailable: {0}")]
    Unavailable(String),
}

/// Brings the tunnel up and down.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TunnelDriver: Send + Sync {
    /// Routes traffic through `settings`, replacing any active route.
    async fn establish(&self, settings: &ProxySettings) -> Result<(), TunnelError>;

    /// Clears the active route.  Clearing when nothing is active succeeds.
    async fn tear_down(&self) -> Result<(), TunnelError>;
}

// ── RequestGateway ────────────────────────────────────────────────────────────

/// Maps each [`Request`] onto the store and the tunnel.
pub struct RequestGateway {
    tunnel: Arc<dyn TunnelDriver>,
}

impl RequestGateway {
    /// Creates a gateway that drives `tunnel`.
    pub fn new(tunnel: Arc<dyn TunnelDriver>) -> Self {
        Self { tunnel }
    }

    /// Handles `request` against `store` and returns the response to send.
    pub async fn handle(&self, store: &mut ConnectionStateStore, request: Request) -> Response {
        debug!(action = request.action_name(), "Handling request");
        match request {
            Request::Connect { config } => self.connect(store, config.as_ref()).await,
            Request::Disconnect => self.disconnect(store).await,
            Request::GetStatus => Response::status(&store.snapshot()),
            Request::SaveConfig { config } => match payload_text(config.as_ref()) {
                Ok(raw) => store.apply_config(raw).await.into(),
                Err(failure) => Response::failure(failure),
            },
            Request::GetConfig => Response::config(&store.snapshot()),
        }
    }

    async fn connect(&self, store: &mut ConnectionStateStore, config: Option<&ConfigPayload>) -> Response {
        let raw = match payload_text(config) {
            Ok(raw) => raw,
            Err(failure) => return Response::failure(failure),
        };
        let before = store.snapshot();
        let previous = if before.connected() {
            before.raw_config().map(str::to_string)
        } else {
            None
        };
        if let Err(failure) = store.apply_config(raw).await {
            debug!("Connect rejected: {failure}");
            return Response::failure(failure);
        }

        let snapshot = store.snapshot();
        let Some(primary) = snapshot.config.as_ref().and_then(|c| c.primary_remote()) else {
            return Response::failure(ParseFailure::NoRemoteFound);
        };

        let settings = ProxySettings::for_endpoint(primary);
        if let Err(e) = self.tunnel.establish(&settings).await {
            warn!(server = %primary, "Tunnel failed to come up: {e}");
            if let Some(previous) = previous {
                if let Err(failure) = store.apply_config(&previous).await {
                    warn!("Could not restore previous config: {failure}");
                }
            }
            return Response::failure(e);
        }

        store.set_connected(true);
        info!(server = %primary, "Connected");
        Response::Ack
    }

    async fn disconnect(&self, store: &mut ConnectionStateStore) -> Response {
        if let Err(e) = self.tunnel.tear_down().await {
            warn!("Tunnel tear-down failed, marking disconnected anyway: {e}");
        }
        store.set_connected(false);
        info!("Disconnected");
        Response::Ack
    }
}

/// Extracts the config text, rejecting a missing object or a non-string `raw`.
fn payload_text(config: Option<&ConfigPayload>) -> Result<&str, ParseFailure> {
    config
        .ok_or_else(|| ParseFailure::InvalidInput("missing config object".to_string()))?
        .text()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
