//! ovpn-daemon library crate.
//!
//! Holds the single authoritative connection state and keeps every UI
//! surface in sync with it.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! UI surfaces (JSON over WebSocket / one-shot TCP)
//!         ↕
//! [ovpn-daemon]
//!   ├── application/      State store, broadcaster, request gateway, dispatcher
//!   └── infrastructure/
//!         ├── storage/        TOML settings, JSON file store, memory store
//!         ├── tunnel          Simulated tunnel (proxy settings only)
//!         ├── transfer        .ovpn import/export for the CLI
//!         ├── wire            Request decoding shared by both transports
//!         ├── ws_server       Standing channels
//!         └── control_socket  One-shot requests and the CLI client
//! ```
//!
//! # Layer rules
//!
//! - `application` depends on `ovpn-core` and on the traits it defines
//!   (`PersistenceAdapter`, `TunnelDriver`, `Subscriber`); it never opens a
//!   socket or a file itself.
//! - `infrastructure` depends on all other layers plus `tokio` and
//!   `tungstenite`.

/// Application layer: the single-writer state machine and its fan-out.
pub mod application;

/// Infrastructure layer: storage, transports, configuration.
pub mod infrastructure;
