//! TOML-based settings for the daemon.
//!
//! Reads `DaemonConfig` from the platform-appropriate file:
//! - Windows:  `%APPDATA%\OvpnControl\daemon.toml`
//! - Linux:    `~/.config/ovpn-control/daemon.toml`
//! - macOS:    `~/Library/Application Support/OvpnControl/daemon.toml`
//!
//! ```toml
//! log_level = "info"
//!
//! [network]
//! ws_bind_address = "127.0.0.1:24850"
//! control_bind_address = "127.0.0.1:24851"
//!
//! [storage]
//! state_dir = "/var/lib/ovpn-control"
//! ```
//!
//! Every field has a serde default, so a missing file, a missing section or a
//! missing key all fall back to the values above.  Command-line flags are
//! applied on top by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// Reading or writing the settings file (or creating its directory) failed.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not valid TOML for [`DaemonConfig`].
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings could not be rendered as TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Listener addresses.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Where the persisted record lives.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Listener addresses.  Both default to loopback: the daemon has no
/// authentication, so it must not be reachable from the network by default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// WebSocket server for standing channels.
    #[serde(default = "default_ws_bind_address")]
    pub ws_bind_address: String,
    /// TCP server for one-shot requests.
    #[serde(default = "default_control_bind_address")]
    pub control_bind_address: String,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    /// Directory holding the persisted configuration record.  `None` means the
    /// platform config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_ws_bind_address() -> String {
    "127.0.0.1:24850".to_string()
}
fn default_control_bind_address() -> String {
    "127.0.0.1:24851".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ws_bind_address: default_ws_bind_address(),
            control_bind_address: default_control_bind_address(),
        }
    }
}

impl DaemonConfig {
    /// Directory for the persisted record: `[storage] state_dir`, or the
    /// platform config directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoPlatformConfigDir`] if no `state_dir` is set
    /// and the platform directory cannot be determined.
    pub fn state_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => config_dir(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for daemon files.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the default settings file path.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("daemon.toml"))
}

/// Loads `DaemonConfig` from the default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<DaemonConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `DaemonConfig` from `path`, returning the defaults if the file does
/// not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<DaemonConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DaemonConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &DaemonConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("OvpnControl"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("ovpn-control"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("OvpnControl"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("ovpn-config-test-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_default_binds_loopback() {
        let cfg = DaemonConfig::default();

        assert_eq!(cfg.network.ws_bind_address, "127.0.0.1:24850");
        assert_eq!(cfg.network.control_bind_address, "127.0.0.1:24851");
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.storage.state_dir.is_none());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: DaemonConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, DaemonConfig::default());
    }

    #[test]
    fn test_partial_network_overrides_defaults() {
        // Arrange
        let toml_str = r#"
log_level = "debug"

[network]
ws_bind_address = "0.0.0.0:9000"
"#;

        // Act
        let cfg: DaemonConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.network.ws_bind_address, "0.0.0.0:9000");
        assert_eq!(cfg.network.control_bind_address, "127.0.0.1:24851");
    }

    #[test]
    fn test_state_dir_prefers_explicit_setting() {
        let mut cfg = DaemonConfig::default();
        cfg.storage.state_dir = Some(PathBuf::from("/srv/ovpn"));

        assert_eq!(cfg.state_dir().unwrap(), PathBuf::from("/srv/ovpn"));
    }

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let path = scratch_dir().join("daemon.toml");

        let cfg = load_config_from(&path).expect("missing file is not an error");

        assert_eq!(cfg, DaemonConfig::default());
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_default_config_written_to_disk_keeps_info_level() {
        // Arrange: what `init-config` writes on a first run
        let dir = scratch_dir();
        let path = dir.join("daemon.toml");

        // Act
        save_config_to(&DaemonConfig::default(), &path).expect("save");
        let written = std::fs::read_to_string(&path).expect("read back");

        // Assert
        assert!(written.contains(r#"log_level = "info""#), "written:\n{written}");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        // Arrange
        let dir = scratch_dir();
        let path = dir.join("daemon.toml");
        let mut cfg = DaemonConfig::default();
        cfg.network.control_bind_address = "127.0.0.1:9999".to_string();
        cfg.storage.state_dir = Some(dir.join("state"));

        // Act
        save_config_to(&cfg, &path).expect("save");
        let restored = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(restored, cfg);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        // Arrange
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("daemon.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_dir_all(dir);
    }
}
