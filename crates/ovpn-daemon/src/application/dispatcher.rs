//! Dispatcher: the single-writer command loop.
//!
//! # How the actor works (for beginners)
//!
//! ```text
//!  ws session ─┐
//!  ws session ─┼─► DispatcherHandle ──mpsc──► Dispatcher::run ──► ConnectionStateStore
//!  control    ─┘        (Clone)              (one tokio task)      RequestGateway
//! ```
//!
//! Every transport owns a cheap clone of [`DispatcherHandle`].  Handles only
//! push [`Command`]s onto a bounded queue.  [`Dispatcher::run`] drains that
//! queue and finishes each command, including any awaited persistence or
//! tunnel I/O, before receiving the next one.  Commands therefore take effect
//! in the order they were dequeued, and a `getStatus` queued after a
//! `connect` always observes the post-connect state.
//!
//! Request replies travel back over a `oneshot` channel created per request.
//! The loop ends once every handle has been dropped.

use ovpn_core::{PushNotification, Request, Response};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use super::broadcaster::SubscriberId;
use super::gateway::RequestGateway;
use super::state_store::ConnectionStateStore;

/// Commands buffered before senders start waiting.
pub const COMMAND_QUEUE_DEPTH: usize = 64;

/// Work items accepted by the dispatcher.
#[derive(Debug)]
pub enum Command {
    /// Handle one request and send the response back on `reply`.
    Request {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
    /// Add `channel` to the live set under `id`.
    Subscribe {
        id: SubscriberId,
        channel: mpsc::UnboundedSender<PushNotification>,
    },
    /// Remove `id` from the live set.
    Unsubscribe {
        id: SubscriberId,
    },
}

/// Returned by [`DispatcherHandle`] calls.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatcher task is gone; no command can be queued or answered.
    #[error("dispatcher has shut down")]
    Closed,
}

// ── DispatcherHandle ──────────────────────────────────────────────────────────

/// Cloneable front used by every transport.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Command>,
}

impl DispatcherHandle {
    /// Queues `request` and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Closed`] if the dispatcher task has stopped.
    pub async fn request(&self, request: Request) -> Result<Response, DispatchError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Request { request, reply }).await?;
        response.await.map_err(|_| DispatchError::Closed)
    }

    /// Opens a standing channel.  The receiver gets an `init` push first.
    pub async fn subscribe(
        &self,
    ) -> Result<(SubscriberId, mpsc::UnboundedReceiver<PushNotification>), DispatchError> {
        let id = Uuid::new_v4();
        let (channel, pushes) = mpsc::unbounded_channel();
        self.send(Command::Subscribe { id, channel }).await?;
        Ok((id, pushes))
    }

    /// Closes the standing channel `id`.
    pub async fn unsubscribe(&self, id: SubscriberId) -> Result<(), DispatchError> {
        self.send(Command::Unsubscribe { id }).await
    }

    async fn send(&self, command: Command) -> Result<(), DispatchError> {
        self.tx.send(command).await.map_err(|_| DispatchError::Closed)
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Owns the store and gateway; see the module docs.
pub struct Dispatcher {
    store: ConnectionStateStore,
    gateway: RequestGateway,
    commands: mpsc::Receiver<Command>,
}

impl Dispatcher {
    /// Creates the dispatcher and its first handle.  Spawn [`run`] next.
    ///
    /// [`run`]: Dispatcher::run
    pub fn new(store: ConnectionStateStore, gateway: RequestGateway) -> (Self, DispatcherHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let dispatcher = Self {
            store,
            gateway,
            commands,
        };
        (dispatcher, DispatcherHandle { tx })
    }

    /// Handles commands one at a time until every handle is dropped.
    ///
    /// Returns the store so callers (and tests) can inspect the final state.
    pub async fn run(mut self) -> ConnectionStateStore {
        info!("Dispatcher started");
        while let Some(command) = self.commands.recv().await {
            self.handle(command).await;
        }
        info!("All handles dropped; dispatcher stopped");
        self.store
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Request { request, reply } => {
                let response = self.gateway.handle(&mut self.store, request).await;
                if reply.send(response).is_err() {
                    debug!("Requester went away before the response was ready");
                }
            }
            Command::Subscribe { id, channel } => self.store.subscribe(id, channel),
            Command::Unsubscribe { id } => {
                self.store.unsubscribe(id);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
