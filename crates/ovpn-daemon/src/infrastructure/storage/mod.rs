//! Storage infrastructure: daemon settings and the persisted config record.
//!
//! - **`config`** reads the TOML settings file from the platform-appropriate
//!   directory and supplies defaults on first run.
//! - **`file_store`** implements [`PersistenceAdapter`] with one JSON file per
//!   key, so the active configuration survives a restart.
//! - **`memory_store`** implements the same trait in memory, for tests and
//!   `--ephemeral` runs.
//!
//! [`PersistenceAdapter`]: crate::application::PersistenceAdapter

pub mod config;
pub mod file_store;
pub mod memory_store;

pub use file_store::JsonFileStore;
pub use memory_store::MemoryStore;
