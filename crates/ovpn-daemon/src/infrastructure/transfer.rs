//! Import and export of `.ovpn` documents for the command-line client.
//!
//! These helpers only move raw text between files and requests.  They never
//! parse it: validation is the daemon's job, so a file that is rejected here
//! is rejected for being unreadable or empty, not for its content.
//!
//! Text is trimmed before it is sent or written, the same way a pasted
//! document is trimmed before it leaves the text box.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// File name used when `export` is given a directory.
pub const DEFAULT_EXPORT_FILENAME: &str = "vpn-config.ovpn";

/// Extensions accepted by [`import_config`].
pub const IMPORT_EXTENSIONS: &[&str] = &["ovpn", "conf"];

/// Why an import, export or submit was refused before reaching the daemon.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Connect was asked for with blank config text.
    #[error("Please paste your .ovpn config first")]
    NothingToConnect,

    /// Save was asked for with blank config text.
    #[error("Config is empty")]
    NothingToSave,

    /// The daemon has no active config to write out.
    #[error("No config to export")]
    NothingToExport,

    #[error("Unsupported config file {path}: expected .ovpn or .conf")]
    UnsupportedExtension { path: PathBuf },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads a `.ovpn` or `.conf` file as text.
///
/// # Errors
///
/// Returns [`TransferError::UnsupportedExtension`] for any other extension and
/// [`TransferError::Read`] if the file cannot be read as UTF-8.
pub fn import_config(path: &Path) -> Result<String, TransferError> {
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMPORT_EXTENSIONS.iter().any(|ok| ext.eq_ignore_ascii_case(ok)));
    if !supported {
        return Err(TransferError::UnsupportedExtension {
            path: path.to_path_buf(),
        });
    }

    let text = std::fs::read_to_string(path).map_err(|source| TransferError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = text.len(), "Config imported");
    Ok(text)
}

/// Trimmed text for a `connect` request.
///
/// # Errors
///
/// Returns [`TransferError::NothingToConnect`] if only whitespace is left.
pub fn config_for_connect(text: &str) -> Result<&str, TransferError> {
    non_empty(text).ok_or(TransferError::NothingToConnect)
}

/// Trimmed text for a `saveConfig` request.
///
/// # Errors
///
/// Returns [`TransferError::NothingToSave`] if only whitespace is left.
pub fn config_for_save(text: &str) -> Result<&str, TransferError> {
    non_empty(text).ok_or(TransferError::NothingToSave)
}

/// Writes `raw` to `path` and returns the path actually written.
///
/// If `path` is an existing directory the file is named
/// [`DEFAULT_EXPORT_FILENAME`] inside it.
///
/// # Errors
///
/// Returns [`TransferError::NothingToExport`] for an empty document and
/// [`TransferError::Write`] for file-system failures.
pub fn export_config(raw: &str, path: &Path) -> Result<PathBuf, TransferError> {
    let text = non_empty(raw).ok_or(TransferError::NothingToExport)?;

    let target = if path.is_dir() {
        path.join(DEFAULT_EXPORT_FILENAME)
    } else {
        path.to_path_buf()
    };
    std::fs::write(&target, text).map_err(|source| TransferError::Write {
        path: target.clone(),
        source,
    })?;
    debug!(path = %target.display(), "Config exported");
    Ok(target)
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ovpn-transfer-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_import_reads_ovpn_and_conf() {
        // Arrange
        let dir = scratch_dir();
        let ovpn = dir.join("office.ovpn");
        let conf = dir.join("home.CONF");
        std::fs::write(&ovpn, "remote a 1\n").unwrap();
        std::fs::write(&conf, "remote b 2\n").unwrap();

        // Act / Assert
        assert_eq!(import_config(&ovpn).unwrap(), "remote a 1\n");
        assert_eq!(import_config(&conf).unwrap(), "remote b 2\n");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_import_rejects_other_extensions() {
        let result = import_config(Path::new("/tmp/profile.txt"));

        assert!(matches!(result, Err(TransferError::UnsupportedExtension { .. })));
    }

    #[test]
    fn test_import_missing_file_is_read_error() {
        let result = import_config(Path::new("/nonexistent/ovpn-control/missing.ovpn"));

        assert!(matches!(result, Err(TransferError::Read { .. })));
    }

    #[test]
    fn test_blank_text_rejected_with_purpose_specific_message() {
        assert_eq!(
            config_for_connect("  \n").unwrap_err().to_string(),
            "Please paste your .ovpn config first"
        );
        assert_eq!(config_for_save("").unwrap_err().to_string(), "Config is empty");
    }

    #[test]
    fn test_config_for_connect_trims() {
        assert_eq!(config_for_connect("\n remote a 1 \n\n").unwrap(), "remote a 1");
    }

    #[test]
    fn test_export_into_directory_uses_default_name() {
        // Arrange
        let dir = scratch_dir();

        // Act
        let written = export_config("remote a 1\n", &dir).unwrap();

        // Assert
        assert_eq!(written, dir.join(DEFAULT_EXPORT_FILENAME));
        assert_eq!(std::fs::read_to_string(&written).unwrap(), "remote a 1");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_export_empty_config_is_rejected() {
        let dir = scratch_dir();

        let result = export_config("   ", &dir);

        assert_eq!(result.unwrap_err().to_string(), "No config to export");
        assert!(!dir.join(DEFAULT_EXPORT_FILENAME).exists());
        let _ = std::fs::remove_dir_all(dir);
    }
}
