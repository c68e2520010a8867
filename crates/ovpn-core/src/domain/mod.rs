//! Domain entities for ovpn-control.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of a clean architecture is the **domain**.  Domain code
//! contains the core rules of the application and never imports OS APIs,
//! network libraries, storage drivers, or UI frameworks.  Outer layers (the
//! daemon's application and infrastructure layers) depend on the domain, but
//! the domain never depends on them, which makes it trivial to unit-test.

/// Configuration document parsing: the core domain concept.
///
/// See [`config::parse_config`] for the entry point.
pub mod config;

/// Connection status, the authoritative record, and its snapshots.
pub mod connection;
