//! WebSocket server: standing channels for UI surfaces.
//!
//! Each accepted connection becomes one session that
//!
//! 1. completes the WebSocket handshake,
//! 2. subscribes to the dispatcher, which immediately queues an `init` push,
//! 3. forwards every push to the socket as a JSON text frame,
//! 4. answers request frames (`{"action":...}`) on the same socket,
//! 5. unsubscribes when either direction ends.
//!
//! Responses and pushes share the socket.  A UI tells them apart by the
//! `type` field, which only pushes carry.
//!
//! # Scalability
//!
//! Every session runs in its own Tokio task and only talks to the rest of the
//! daemon through a [`DispatcherHandle`] clone, so a slow UI never blocks the
//! accept loop or another session.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use crate::application::DispatcherHandle;
use crate::infrastructure::wire;

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `bind_addr` and serves standing channels until `running` is cleared.
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
        .with_context(|| format!("failed to bind WebSocket listener on {bind_addr}"))?;
    info!("WebSocket server listening on {bind_addr}");
    serve(listener, handle, running).await;
    Ok(())
}

/// Accept loop over an already-bound listener.
pub async fn serve(listener: TcpListener, handle: DispatcherHandle, running: Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("Shutdown flag set; stopping WebSocket accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("New WebSocket connection from {peer_addr}");
                let handle = handle.clone();
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, handle).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_session(stream: TcpStream, peer_addr: SocketAddr, handle: DispatcherHandle) {
    match run_session(stream, peer_addr, handle).await {
        Ok(()) => info!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_session(stream: TcpStream, peer_addr: SocketAddr, handle: DispatcherHandle) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let (subscriber_id, mut pushes) = handle
        .subscribe()
        .await
        .context("dispatcher unavailable")?;
    info!("session {peer_addr}: subscribed as {subscriber_id}");

    let (ws_tx, mut ws_rx) = ws_stream.split();
    let ws_tx = Arc::new(Mutex::new(ws_tx));

    // ── Pushes → socket ───────────────────────────────────────────────────────
    let push_tx = Arc::clone(&ws_tx);
    let push_task = tokio::spawn(async move {
        while let Some(notification) = pushes.recv().await {
            let Some(json) = wire::encode(&notification) else {
                continue;
            };
            if push_tx.lock().await.send(WsMessage::Text(json)).await.is_err() {
                debug!("session {peer_addr}: push send failed (UI disconnected)");
                break;
            }
        }
    });

    // ── Socket → requests ─────────────────────────────────────────────────────
    let request_handle = handle.clone();
    let request_task = tokio::spawn(async move {
        loop {
            let frame = match ws_rx.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                    debug!("session {peer_addr}: WebSocket closed");
                    break;
                }
                Some(Err(e)) => {
                    warn!("session {peer_addr}: WebSocket error: {e}");
                    break;
                }
                None => break,
            };

            match frame {
                WsMessage::Text(text) => {
                    let response = wire::answer(&request_handle, &text).await;
                    let Some(json) = wire::encode(&response) else {
                        continue;
                    };
                    if ws_tx.lock().await.send(WsMessage::Text(json)).await.is_err() {
                        debug!("session {peer_addr}: response send failed");
                        break;
                    }
                }
                WsMessage::Binary(_) => {
                    warn!("session {peer_addr}: unexpected binary frame (ignored)");
                }
                WsMessage::Close(_) => {
                    debug!("session {peer_addr}: Close frame received");
                    break;
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
            }
        }
    });

    tokio::select! {
        _ = push_task => debug!("session {peer_addr}: push task ended"),
        _ = request_task => debug!("session {peer_addr}: request task ended"),
    }

    if handle.unsubscribe(subscriber_id).await.is_err() {
        debug!("session {peer_addr}: dispatcher already stopped");
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{ConnectionStateStore, Dispatcher, RequestGateway};
    use crate::infrastructure::storage::MemoryStore;
    use crate::infrastructure::tunnel::SimulatedTunnel;
    use ovpn_core::{PushNotification, Request, Response};
    use tokio_tungstenite::connect_async;

    async fn start() -> (SocketAddr, Arc<AtomicBool>) {
        let store = ConnectionStateStore::new(Arc::new(MemoryStore::new()));
        let gateway = RequestGateway::new(Arc::new(SimulatedTunnel::new()));
        let (dispatcher, handle) = Dispatcher::new(store, gateway);
        tokio::spawn(dispatcher.run());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        tokio::spawn(serve(listener, handle, Arc::clone(&running)));
        (addr, running)
    }

    async fn next_text<S>(ws: &mut S) -> String
    where
        S: futures_util::Stream<Item = Result<WsMessage, WsError>> + Unpin,
    {
        loop {
            match ws.next().await.unwrap().unwrap() {
                WsMessage::Text(text) => return text,
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_session_receives_init_then_answers_requests() {
        // Arrange
        let (addr, running) = start().await;
        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();

        // Act / Assert: init arrives first
        let init: PushNotification = serde_json::from_str(&next_text(&mut ws).await).unwrap();
        assert!(matches!(init, PushNotification::Init { connected: false, config: None }));

        let request = serde_json::to_string(&Request::GetStatus).unwrap();
        ws.send(WsMessage::Text(request)).await.unwrap();
        let response: Response = serde_json::from_str(&next_text(&mut ws).await).unwrap();
        assert_eq!(
            response,
            Response::Status {
                connected: false,
                config: None
            }
        );

        running.store(false, Ordering::Relaxed);
    }

    #[tokio::test]
    async fn test_change_from_one_session_is_pushed_to_another() {
        // Arrange: a watcher session and an actor session
        let (addr, running) = start().await;
        let (mut watcher, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let _init = next_text(&mut watcher).await;
        let (mut actor, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let _init = next_text(&mut actor).await;

        // Act
        let request = serde_json::to_string(&Request::save_config("remote a 1\n")).unwrap();
        actor.send(WsMessage::Text(request)).await.unwrap();

        // Assert
        let push: PushNotification = serde_json::from_str(&next_text(&mut watcher).await).unwrap();
        assert!(matches!(push, PushNotification::Status { .. }));
        assert_eq!(push.config(), Some("remote a 1\n"));

        running.store(false, Ordering::Relaxed);
    }
}
