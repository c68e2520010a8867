//! # ovpn-core
//!
//! Shared library for ovpn-control containing the OpenVPN configuration
//! parser, the connection-state model, and the JSON message protocol spoken
//! between UI surfaces and the daemon.
//!
//! It has zero dependencies on async runtimes, sockets, or the file system.
//!
//! # Architecture overview (for beginners)
//!
//! ovpn-control lets a user paste an `.ovpn` document, "connect" a simulated
//! tunnel, and keep every open UI surface in sync with the single
//! authoritative connection state held by the daemon.
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure business logic.  The most important piece is
//!   [`parse_config`]: a single-pass, line-oriented parser that turns the raw
//!   document into a [`ParsedConfig`] while keeping the original text
//!   byte-for-byte.
//!
//! - **`protocol`** – The "language" on the wire.  Requests, responses, and
//!   push notifications are serde types serialised as JSON objects.

// Rust looks for each module in a subdirectory with the same name
// (e.g., src/domain/mod.rs).
pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `ovpn_core::ParsedConfig` instead of `ovpn_core::domain::config::ParsedConfig`.
pub use domain::config::{
    parse_config, AuthMethod, ParseFailure, ParsedConfig, RemoteEndpoint, SectionTag,
};
pub use domain::connection::{ConnectionRecord, ConnectionStatus, Snapshot};
pub use protocol::messages::{ConfigPayload, PushNotification, Request, Response};
