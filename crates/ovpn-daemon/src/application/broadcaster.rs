//! Broadcaster: fan-out of state snapshots to standing channels.
//!
//! Every open UI surface holds one standing channel.  The broadcaster keeps
//! the live set of those channels and, whenever the connection record
//! changes, pushes the new snapshot to each of them.
//!
//! # Delivery rules
//!
//! - A channel receives an `init` push the moment it subscribes, so it never
//!   has to wait for an unrelated change to learn the current state.
//! - Each change is pushed at most once to each channel that is live at the
//!   time.  There is no replay log.
//! - A channel whose push fails is removed in the same pass; the live set
//!   never accumulates dead entries.
//! - The set is keyed by [`SubscriberId`], so subscribing the same channel
//!   twice still yields a single live entry.

use std::collections::HashMap;

use ovpn_core::{PushNotification, Snapshot};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifies one standing channel.
pub type SubscriberId = Uuid;

/// A push could not be delivered because the channel is closed or broken.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("subscriber channel closed")]
pub struct PushError;

/// The sending end of a standing channel.
///
/// Infrastructure uses an unbounded tokio channel per WebSocket session; tests
/// use recording doubles.
pub trait Subscriber: Send {
    /// Delivers one notification without blocking.
    fn push(&self, notification: &PushNotification) -> Result<(), PushError>;
}

impl Subscriber for mpsc::UnboundedSender<PushNotification> {
    fn push(&self, notification: &PushNotification) -> Result<(), PushError> {
        self.send(notification.clone()).map_err(|_| PushError)
    }
}

/// The live set of standing channels.
#[derive(Default)]
pub struct Broadcaster {
    subscribers: HashMap<SubscriberId, Box<dyn Subscriber>>,
}

impl Broadcaster {
    /// Creates an empty live set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `channel` under `id` and immediately pushes an `init` snapshot.
    ///
    /// Re-subscribing an existing `id` replaces the previous channel.  A
    /// channel that cannot even take the `init` push is not added.
    pub fn subscribe(&mut self, id: SubscriberId, channel: impl Subscriber + 'static, snapshot: &Snapshot) {
        if let Err(e) = channel.push(&PushNotification::init(snapshot)) {
            warn!(subscriber = %id, "init push failed, not subscribing: {e}");
            self.subscribers.remove(&id);
            return;
        }
        if self.subscribers.insert(id, Box::new(channel)).is_some() {
            debug!(subscriber = %id, "re-subscribed; previous channel replaced");
        } else {
            debug!(subscriber = %id, live = self.subscribers.len(), "subscribed");
        }
    }

    /// Removes `id` from the live set.  Returns `false` if it was not present.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, live = self.subscribers.len(), "unsubscribed");
        }
        removed
    }

    /// Pushes a `status` snapshot to every live channel, dropping failed ones.
    ///
    /// Returns the number of channels the push was delivered to.
    pub fn notify_all(&mut self, snapshot: &Snapshot) -> usize {
        let notification = PushNotification::status(snapshot);
        let mut delivered = 0;
        self.subscribers.retain(|id, channel| match channel.push(&notification) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(e) => {
                debug!(subscriber = %id, "dropping subscriber: {e}");
                false
            }
        });
        delivered
    }

    /// Whether `id` is in the live set.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    /// Number of live channels.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

// ── Test doubles ──────────────────────────────────────────────────────────────

/// Recording subscriber shared by the application-layer unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Records every push; clones share the same log and failure switch.
    #[derive(Clone, Default)]
    pub struct RecordingSubscriber {
        received: Arc<Mutex<Vec<PushNotification>>>,
        broken: Arc<AtomicBool>,
    }

    impl RecordingSubscriber {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every later push fail, as if the UI surface had closed.
        pub fn break_channel(&self) {
            self.broken.store(true, Ordering::SeqCst);
        }

        pub fn received(&self) -> Vec<PushNotification> {
            self.received.lock().unwrap().clone()
        }

        pub fn count(&self) -> usize {
            self.received.lock().unwrap().len()
        }
    }

    impl Subscriber for RecordingSubscriber {
        fn push(&self, notification: &PushNotification) -> Result<(), PushError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(PushError);
            }
            self.received.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
