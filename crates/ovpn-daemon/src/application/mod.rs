//! Application layer for the daemon.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure rules in `ovpn-core`) and the infrastructure (sockets, files).
//! Code here orchestrates domain objects to fulfil a request and depends on
//! abstractions (traits) rather than concrete I/O, so every piece can be
//! tested with in-memory doubles.
//!
//! # Sub-modules
//!
//! - **`state_store`** – The sole owner and mutator of the connection record.
//!   Validates configs with the parser and persists them.
//!
//! - **`broadcaster`** – The live set of standing channels; pushes a snapshot
//!   to each of them after every change and drops the ones that fail.
//!
//! - **`gateway`** – Maps one [`ovpn_core::Request`] to one
//!   [`ovpn_core::Response`] by delegating to the store and the tunnel.
//!
//! - **`dispatcher`** – The single-writer loop: one task owns the store and
//!   handles queued commands strictly one after another.

pub mod broadcaster;
pub mod dispatcher;
pub mod gateway;
pub mod state_store;

pub use broadcaster::{Broadcaster, PushError, Subscriber, SubscriberId};
pub use dispatcher::{Command, DispatchError, Dispatcher, DispatcherHandle};
pub use gateway::{ProxySettings, RequestGateway, TunnelDriver, TunnelError};
pub use state_store::{ConnectionStateStore, PersistenceAdapter, PersistenceError, CONFIG_KEY};
