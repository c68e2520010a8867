//! ConnectionStateStore: the single owner of the connection record.
//!
//! # Responsibilities
//!
//! 1. Restore the last valid configuration from persistence at start-up.
//! 2. Validate new configuration text with [`parse_config`] before it can
//!    become active.  A failed parse never touches the current record.
//! 3. Persist every accepted configuration under [`CONFIG_KEY`].
//! 4. Flip the connected flag on request.
//! 5. Tell the [`Broadcaster`] about every change.
//!
//! # Why is there no lock? (for beginners)
//!
//! The store is owned by exactly one tokio task, the
//! [`Dispatcher`](super::dispatcher::Dispatcher).  Every mutating method takes
//! `&mut self`, so the borrow checker already guarantees that two commands can
//! never interleave on the record.  Other tasks only ever see a
//! [`Snapshot`], which is an owned copy.
//!
//! # Persistence is best-effort
//!
//! A failed write is logged and the in-memory state is still updated: the
//! daemon keeps working with a read-only or full disk, it just forgets the
//! config on restart.

use std::sync::Arc;

use async_trait::async_trait;
use ovpn_core::{parse_config, ConnectionRecord, ConnectionStatus, ParseFailure, ParsedConfig, Snapshot};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::broadcaster::{Broadcaster, Subscriber, SubscriberId};

/// The fixed key the active configuration is stored under.
pub const CONFIG_KEY: &str = "ovpnConfig";

// ── Persistence seam ──────────────────────────────────────────────────────────

/// Errors raised by a [`PersistenceAdapter`] implementation.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The backend's file or socket operation failed.
    #[error("storage I/O failed for key {key:?}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend cannot serve requests at all.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Async key/value storage for the persisted configuration record.
///
/// Values are opaque strings; the store decides the encoding.
///
/// # Implementations
///
/// - `JsonFileStore` – one file per key under the state directory.
/// - `MemoryStore` – a map behind a mutex, for tests and `--ephemeral` runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Returns the stored value, or `None` if the key was never written.
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError>;

    /// Removes `key`.  Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), PersistenceError>;
}

// ── ConnectionStateStore ──────────────────────────────────────────────────────

/// Sole mutator of the [`ConnectionRecord`].
pub struct ConnectionStateStore {
    record: ConnectionRecord,
    persistence: Arc<dyn PersistenceAdapter>,
    broadcaster: Broadcaster,
}

impl ConnectionStateStore {
    /// Creates an empty, disconnected store.  Call [`load_initial`] next.
    ///
    /// [`load_initial`]: ConnectionStateStore::load_initial
    pub fn new(persistence: Arc<dyn PersistenceAdapter>) -> Self {
        Self {
            record: ConnectionRecord::new(),
            persistence,
            broadcaster: Broadcaster::new(),
        }
    }

    /// Restores the persisted configuration, if any.
    ///
    /// The status always starts as `Disconnected`.  A read error is logged and
    /// treated as "no prior config".
    ///
    /// # Errors
    ///
    /// Returns [`ParseFailure::PersistenceCorrupt`] when a stored record exists
    /// but cannot be decoded.  The entry has already been deleted and the store
    /// is usable; the error is returned so the caller can report it.
    pub async fn load_initial(&mut self) -> Result<(), ParseFailure> {
        self.record = ConnectionRecord::new();

        let stored = match self.persistence.get(CONFIG_KEY).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                info!("No stored config; starting empty");
                return Ok(());
            }
            Err(e) => {
                warn!("Could not read stored config, starting empty: {e}");
                return Ok(());
            }
        };

        match ParsedConfig::from_persisted(&stored) {
            Ok(config) => {
                info!(remotes = config.remotes.len(), "Restored stored config");
                self.record.active_config = Some(config);
                Ok(())
            }
            Err(failure) => {
                warn!("{failure}; discarding stored record");
                if let Err(e) = self.persistence.delete(CONFIG_KEY).await {
                    warn!("Failed to delete corrupt record: {e}");
                }
                Err(failure)
            }
        }
    }

    /// Validates `raw` and, if it parses, makes it the active configuration.
    ///
    /// On success the parsed record is persisted, replaces the active config
    /// and is broadcast.  The connected flag is not touched.
    ///
    /// # Errors
    ///
    /// Returns the parser's [`ParseFailure`]; the prior config stays active and
    /// nothing is persisted or broadcast.
    pub async fn apply_config(&mut self, raw: &str) -> Result<(), ParseFailure> {
        let config = parse_config(raw)?;

        match config.to_persisted() {
            Ok(encoded) => {
                if let Err(e) = self.persistence.set(CONFIG_KEY, encoded).await {
                    warn!("Failed to persist config, keeping it in memory only: {e}");
                }
            }
            Err(e) => warn!("Failed to encode config for storage: {e}"),
        }

        debug!(remotes = config.remotes.len(), "Config applied");
        self.record.active_config = Some(config);
        self.broadcast();
        Ok(())
    }

    /// Sets the status to `Connected` or `Disconnected` and broadcasts.
    pub fn set_connected(&mut self, connected: bool) {
        self.record.status = ConnectionStatus::from_connected(connected);
        debug!(status = %self.record.status, "Status changed");
        self.broadcast();
    }

    /// Read-only copy of `{connected, config}` at this moment.
    pub fn snapshot(&self) -> Snapshot {
        self.record.snapshot()
    }

    /// Registers a standing channel; it receives an `init` push right away.
    pub fn subscribe(&mut self, id: SubscriberId, channel: impl Subscriber + 'static) {
        let snapshot = self.snapshot();
        self.broadcaster.subscribe(id, channel, &snapshot);
    }

    /// Drops a standing channel.  Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.broadcaster.unsubscribe(id)
    }

    /// Number of live standing channels.
    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.len()
    }

    fn broadcast(&mut self) {
        let snapshot = self.record.snapshot();
        let delivered = self.broadcaster.notify_all(&snapshot);
        debug!(delivered, "Snapshot broadcast");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
