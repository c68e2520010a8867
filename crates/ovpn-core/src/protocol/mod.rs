//! Protocol module containing the JSON message types.

pub mod messages;

pub use messages::*;
