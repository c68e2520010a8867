//! One-shot control socket.
//!
//! A TCP listener that speaks newline-delimited JSON: the caller writes one
//! request line, reads one response line, and the connection is closed.  The
//! command-line client uses it for `status`, `connect` and the other
//! subcommands; anything that wants live updates uses the WebSocket server.
//!
//! ```text
//! → {"action":"getStatus"}
//! ← {"success":true,"connected":false,"config":null}
//! ```

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use ovpn_core::{Request, Response};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::application::DispatcherHandle;
use crate::infrastructure::wire;

/// How long the client waits for the response line.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the server waits for a peer's request line.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest request line the server reads.  Configs with embedded
/// certificates run to tens of kilobytes.
pub const MAX_REQUEST_BYTES: u64 = 1024 * 1024;

const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Server ────────────────────────────────────────────────────────────────────

/// Binds `bind_addr` and answers one-shot requests until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    bind_addr: SocketAddr,
    handle: DispatcherHandle,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind control socket on {bind_addr}"))?;
    info!("Control socket listening on {bind_addr}");
    serve(listener, handle, running).await;
    Ok(())
}

/// Accept loop over an already-bound listener.
pub async fn serve(listener: TcpListener, handle: DispatcherHandle, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                let handle = handle.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &handle, REQUEST_TIMEOUT).await {
                        debug!("control connection {peer_addr} error: {e:#}");
                    }
                });
            }
            Ok(Err(e)) => error!("control socket accept error: {e}"),
            Err(_) => {}
        }
    }
    info!("Shutdown flag set; stopping control socket");
}

async fn handle_connection(
    stream: TcpStream,
    handle: &DispatcherHandle,
    read_timeout: Duration,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader).take(MAX_REQUEST_BYTES);
    let mut line = String::new();

    timeout(read_timeout, reader.read_line(&mut line))
        .await
        .context("timed out waiting for request")?
        .context("failed to read request")?;

    let response = wire::answer(handle, line.trim()).await;
    let Some(json) = wire::encode(&response) else {
        return Ok(());
    };

    writer
        .write_all(json.as_bytes())
        .await
        .context("failed to write response")?;
    writer.write_all(b"\n").await.context("failed to write newline")?;
    Ok(())
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Why a control-socket request did not produce the expected answer.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Nothing is listening at the control address.
    #[error("Failed to connect to control socket at {addr}: {source}. Is the daemon running?")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The connection broke while writing the request or reading the reply.
    #[error("control socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// No reply line within [`RESPONSE_TIMEOUT`].
    #[error("Timeout waiting for response")]
    Timeout,

    /// The reply line was not a JSON response.
    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The daemon answered with `{"success":false}`.
    #[error("{0}")]
    Rejected(String),

    /// A well-formed reply of the wrong kind for the request.
    #[error("Unexpected response")]
    Unexpected,
}

/// Client for the one-shot control socket.
#[derive(Debug, Clone)]
pub struct ControlClient {
    addr: SocketAddr,
}

impl ControlClient {
    /// Creates a client for the daemon listening at `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Sends one request and returns the raw response.
    ///
    /// A `{"success":false}` answer is returned as `Ok`; the typed helpers
    /// below turn it into [`ControlError::Rejected`].
    pub async fn request(&self, request: &Request) -> Result<Response, ControlError> {
        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(|source| ControlError::Connect {
                addr: self.addr,
                source,
            })?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let request_json = serde_json::to_string(request)?;
        writer.write_all(request_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        let mut line = String::new();
        timeout(RESPONSE_TIMEOUT, reader.read_line(&mut line))
            .await
            .map_err(|_| ControlError::Timeout)??;

        Ok(serde_json::from_str(line.trim())?)
    }

    /// Returns `(connected, active config text)`.
    pub async fn status(&self) -> Result<(bool, Option<String>), ControlError> {
        match self.request(&Request::GetStatus).await? {
            Response::Status { connected, config } => Ok((connected, config)),
            Response::Failure { error } => Err(ControlError::Rejected(error)),
            _ => Err(ControlError::Unexpected),
        }
    }

    /// Returns the active config text, if any.
    pub async fn config(&self) -> Result<Option<String>, ControlError> {
        match self.request(&Request::GetConfig).await? {
            Response::Config { config } => Ok(config),
            Response::Failure { error } => Err(ControlError::Rejected(error)),
            _ => Err(ControlError::Unexpected),
        }
    }

    /// Applies `raw` and brings the tunnel up.
    pub async fn connect(&self, raw: &str) -> Result<(), ControlError> {
        self.expect_ack(Request::connect(raw)).await
    }

    /// Brings the tunnel down.
    pub async fn disconnect(&self) -> Result<(), ControlError> {
        self.expect_ack(Request::Disconnect).await
    }

    /// Applies `raw` without touching the tunnel.
    pub async fn save_config(&self, raw: &str) -> Result<(), ControlError> {
        self.expect_ack(Request::save_config(raw)).await
    }

    async fn expect_ack(&self, request: Request) -> Result<(), ControlError> {
        match self.request(&request).await? {
            Response::Ack => Ok(()),
            Response::Failure { error } => Err(ControlError::Rejected(error)),
            _ => Err(ControlError::Unexpected),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
