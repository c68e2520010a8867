//! Infrastructure layer: everything that touches a socket or a file.
//!
//! - **`storage`** – TOML daemon settings and the `PersistenceAdapter`
//!   implementations.
//! - **`tunnel`** – The simulated tunnel behind `TunnelDriver`.
//! - **`transfer`** – Reading and writing `.ovpn` files for the CLI.
//! - **`wire`** – JSON request decoding shared by both transports.
//! - **`ws_server`** – WebSocket standing channels.
//! - **`control_socket`** – One-shot newline-JSON requests and the client
//!   used by the CLI.

pub mod control_socket;
pub mod storage;
pub mod transfer;
pub mod tunnel;
pub mod wire;
pub mod ws_server;
