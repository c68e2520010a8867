//! OpenVPN configuration document parser.
//!
//! Turns the semi-structured text of an `.ovpn` file into a [`ParsedConfig`].
//! Only the handful of directives the control-plane needs are extracted; every
//! other line is ignored, and the original document is always kept verbatim in
//! [`ParsedConfig::raw`] so it can be persisted and exported byte-for-byte.
//!
//! # Document shape (for beginners)
//!
//! ```text
//! client
//! remote vpn.example.com 1194 udp     ← endpoint (host, port, proto)
//! remote backup.example.com 443 tcp   ← second endpoint, order matters
//! cipher AES-256-GCM
//! auth-user-pass                      ← credentials will be requested
//! <ca>                                ← embedded section opens
//! -----BEGIN CERTIFICATE-----
//! ...
//! -----END CERTIFICATE-----
//! </ca>                               ← section closes
//! ```
//!
//! # Parsing model
//!
//! A single pass over the lines with one piece of state: the section we are
//! currently inside (if any).  Tag lines switch the section; lines inside a
//! section are accumulated untouched; lines outside a section are matched
//! against directive prefixes, first match wins.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Protocol assumed for a `remote` line that does not name one.
pub const DEFAULT_PROTO: &str = "tcp";

// ── Error type ────────────────────────────────────────────────────────────────

/// Why a configuration could not be accepted.
///
/// The `Display` text is the human-readable reason returned to UI callers in
/// the `error` field of a failed response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseFailure {
    /// The payload did not carry the configuration as text.
    #[error("Invalid config: {0}")]
    InvalidInput(String),

    /// The document parsed, but no usable `remote` directive was found.
    #[error("No remote servers found in config")]
    NoRemoteFound,

    /// A stored configuration record could not be decoded on load.
    #[error("Stored config is corrupt: {0}")]
    PersistenceCorrupt(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// One candidate server taken from a `remote HOST PORT [PROTO]` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    /// Hostname or IP address, exactly as written.
    pub host: String,
    /// Port token, exactly as written (it is not required to be numeric).
    pub port: String,
    /// Transport protocol; [`DEFAULT_PROTO`] when the line omits it.
    pub proto: String,
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.port, self.proto)
    }
}

/// How the configuration asks the user to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMethod {
    /// `auth-user-pass`: a username/password prompt.
    #[serde(rename = "user-pass")]
    UserPass,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::UserPass => f.write_str("Username/Password"),
        }
    }
}

/// Embedded sections whose bodies are captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionTag {
    Ca,
    Cert,
    Key,
    TlsCrypt,
}

impl SectionTag {
    /// Recognises an opening tag line such as `<ca>`.
    pub fn from_open_tag(line: &str) -> Option<Self> {
        match line {
            "<ca>" => Some(SectionTag::Ca),
            "<cert>" => Some(SectionTag::Cert),
            "<key>" => Some(SectionTag::Key),
            "<tls-crypt>" => Some(SectionTag::TlsCrypt),
            _ => None,
        }
    }

    /// Name used as the key in [`ParsedConfig::certificates`].
    pub fn as_str(self) -> &'static str {
        match self {
            SectionTag::Ca => "ca",
            SectionTag::Cert => "cert",
            SectionTag::Key => "key",
            SectionTag::TlsCrypt => "tls-crypt",
        }
    }
}

/// A validated configuration.
///
/// `remotes` is never empty for a value produced by [`parse_config`] or
/// accepted by [`ParsedConfig::from_persisted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedConfig {
    /// Endpoints in document order; the first one is the primary endpoint.
    pub remotes: Vec<RemoteEndpoint>,
    /// Section name → accumulated body text, each line newline-terminated.
    #[serde(default)]
    pub certificates: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    /// The document exactly as it was submitted.
    pub raw: String,
}

impl ParsedConfig {
    /// The endpoint shown to the user and used to bring the tunnel up.
    pub fn primary_remote(&self) -> Option<&RemoteEndpoint> {
        self.remotes.first()
    }

    /// Body of an embedded section, if the document had one.
    pub fn certificate(&self, tag: SectionTag) -> Option<&str> {
        self.certificates.get(tag.as_str()).map(String::as_str)
    }

    /// "Connection details" lines for display.
    ///
    /// ```rust
    /// let cfg = ovpn_core::parse_config("remote vpn.example.com 1194 udp\ncipher AES-256-GCM\n").unwrap();
    /// assert_eq!(
    ///     cfg.summary(),
    ///     vec!["Server: vpn.example.com:1194 (udp)", "Cipher: AES-256-GCM"]
    /// );
    /// ```
    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(remote) = self.primary_remote() {
            lines.push(format!("Server: {remote}"));
        }
        if let Some(cipher) = &self.cipher {
            lines.push(format!("Cipher: {cipher}"));
        }
        if let Some(auth) = self.auth_method {
            lines.push(format!("Auth: {auth}"));
        }
        lines
    }

    /// Decodes a record previously written by the persistence layer.
    ///
    /// # Errors
    ///
    /// Returns [`ParseFailure::PersistenceCorrupt`] when the JSON does not
    /// decode or the decoded record breaks the non-empty `remotes` invariant.
    pub fn from_persisted(json: &str) -> Result<Self, ParseFailure> {
        let cfg: ParsedConfig = serde_json::from_str(json)
            .map_err(|e| ParseFailure::PersistenceCorrupt(e.to_string()))?;
        if cfg.remotes.is_empty() {
            return Err(ParseFailure::PersistenceCorrupt(
                "record has no remote endpoints".to_string(),
            ));
        }
        Ok(cfg)
    }

    /// Encodes the record for the persistence layer.
    ///
    /// # Errors
    ///
    /// Propagates the `serde_json` error; with the field types used here this
    /// does not happen in practice.
    pub fn to_persisted(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Parses an `.ovpn` document.
///
/// # Errors
///
/// Returns [`ParseFailure::NoRemoteFound`] if no `remote` line with at least a
/// host and a port was found.
///
/// # Example
///
/// ```rust
/// use ovpn_core::{parse_config, ParseFailure};
///
/// let cfg = parse_config("remote vpn.example.com 1194 udp\n").unwrap();
/// assert_eq!(cfg.remotes[0].host, "vpn.example.com");
///
/// assert_eq!(parse_config("proto udp\n"), Err(ParseFailure::NoRemoteFound));
/// ```
pub fn parse_config(text: &str) -> Result<ParsedConfig, ParseFailure> {
    let mut remotes = Vec::new();
    let mut certificates: BTreeMap<String, String> = BTreeMap::new();
    let mut auth_method = None;
    let mut cipher = None;
    let mut current_section: Option<SectionTag> = None;

    for line in text.lines() {
        let trimmed = line.trim();

        if is_tag_line(trimmed) {
            // Any tag line switches the section and is never part of a blob.
            current_section = SectionTag::from_open_tag(trimmed);
            continue;
        }

        if let Some(section) = current_section {
            let blob = certificates.entry(section.as_str().to_string()).or_default();
            blob.push_str(line);
            blob.push('\n');
            continue;
        }

        if trimmed.starts_with("remote ") {
            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            if tokens.len() >= 3 {
                remotes.push(RemoteEndpoint {
                    host: tokens[1].to_string(),
                    port: tokens[2].to_string(),
                    proto: tokens.get(3).copied().unwrap_or(DEFAULT_PROTO).to_string(),
                });
            } else {
                trace!(line = trimmed, "ignoring remote line without host and port");
            }
        } else if trimmed.starts_with("auth-user-pass") {
            auth_method = Some(AuthMethod::UserPass);
        } else if trimmed.starts_with("cipher ") {
            if let Some(name) = trimmed.split_whitespace().nth(1) {
                cipher = Some(name.to_string());
            }
        }
    }

    if remotes.is_empty() {
        return Err(ParseFailure::NoRemoteFound);
    }

    Ok(ParsedConfig {
        remotes,
        certificates,
        auth_method,
        cipher,
        raw: text.to_string(),
    })
}

/// `<name>` or `</name>`.  A body line that merely starts with `<` is content.
fn is_tag_line(trimmed: &str) -> bool {
    trimmed.len() > 2 && trimmed.starts_with('<') && trimmed.ends_with('>')
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "client\n\
dev tun\n\
remote vpn.example.com 1194 udp\n\
remote backup.example.com 443\n\
cipher AES-256-GCM\n\
auth-user-pass\n\
<ca>\n\
-----BEGIN CERTIFICATE-----\n\
MIIB\n\
-----END CERTIFICATE-----\n\
</ca>\n\
<tls-crypt>\n\
abcdef\n\
</tls-crypt>\n";

    // ── Remote endpoints ──────────────────────────────────────────────────────

    #[test]
    fn test_parse_extracts_remotes_in_document_order() {
        // Arrange / Act
        let cfg = parse_config(SAMPLE).unwrap();

        // Assert
        assert_eq!(cfg.remotes.len(), 2);
        assert_eq!(cfg.remotes[0].host, "vpn.example.com");
        assert_eq!(cfg.remotes[0].port, "1194");
        assert_eq!(cfg.remotes[0].proto, "udp");
        assert_eq!(cfg.remotes[1].host, "backup.example.com");
    }

    #[test]
    fn test_remote_without_proto_defaults_to_tcp() {
        let cfg = parse_config("remote host.example 443\n").unwrap();
        assert_eq!(cfg.remotes[0].proto, "tcp");
    }

    #[test]
    fn test_remote_tokens_split_on_whitespace_runs() {
        let cfg = parse_config("remote   host.example\t\t8443    udp\n").unwrap();
        assert_eq!(
            cfg.remotes[0],
            RemoteEndpoint {
                host: "host.example".to_string(),
                port: "8443".to_string(),
                proto: "udp".to_string(),
            }
        );
    }

    #[test]
    fn test_remote_with_only_host_is_silently_ignored() {
        // Arrange: the first remote is malformed, the second is usable
        let text = "remote lonely.example\nremote good.example 1194\n";

        // Act
        let cfg = parse_config(text).unwrap();

        // Assert
        assert_eq!(cfg.remotes.len(), 1);
        assert_eq!(cfg.remotes[0].host, "good.example");
    }

    #[test]
    fn test_indented_remote_line_is_recognised() {
        let cfg = parse_config("   remote indented.example 1194 udp   \n").unwrap();
        assert_eq!(cfg.remotes[0].host, "indented.example");
    }

    #[test]
    fn test_primary_remote_is_first_entry() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.primary_remote().unwrap().host, "vpn.example.com");
    }

    // ── Failures ──────────────────────────────────────────────────────────────

    #[test]
    fn test_no_remote_lines_fails_with_no_remote_found() {
        assert_eq!(
            parse_config("cipher AES-256-GCM\n"),
            Err(ParseFailure::NoRemoteFound)
        );
    }

    #[test]
    fn test_only_malformed_remotes_fails_with_no_remote_found() {
        assert_eq!(
            parse_config("remote only-host\n"),
            Err(ParseFailure::NoRemoteFound)
        );
    }

    #[test]
    fn test_empty_document_fails_with_no_remote_found() {
        assert_eq!(parse_config(""), Err(ParseFailure::NoRemoteFound));
    }

    #[test]
    fn test_remote_inside_section_is_not_a_directive() {
        // Arrange: the only remote line sits inside <ca> and is blob content
        let text = "<ca>\nremote hidden.example 1194\n</ca>\n";

        // Act
        let result = parse_config(text);

        // Assert
        assert_eq!(result, Err(ParseFailure::NoRemoteFound));
    }

    #[test]
    fn test_no_remote_found_message_is_user_facing() {
        assert_eq!(
            ParseFailure::NoRemoteFound.to_string(),
            "No remote servers found in config"
        );
    }

    // ── Directives ────────────────────────────────────────────────────────────

    #[test]
    fn test_cipher_takes_second_token() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.cipher.as_deref(), Some("AES-256-GCM"));
    }

    #[test]
    fn test_auth_user_pass_with_path_sets_user_pass() {
        let cfg = parse_config("remote h 1\nauth-user-pass creds.txt\n").unwrap();
        assert_eq!(cfg.auth_method, Some(AuthMethod::UserPass));
    }

    #[test]
    fn test_missing_optional_directives_stay_none() {
        let cfg = parse_config("remote h 1\n").unwrap();
        assert!(cfg.cipher.is_none());
        assert!(cfg.auth_method.is_none());
        assert!(cfg.certificates.is_empty());
    }

    // ── Sections ──────────────────────────────────────────────────────────────

    #[test]
    fn test_section_body_is_captured_without_tag_lines() {
        let cfg = parse_config("remote h 1\n<ca>\nLINE1\nLINE2\n</ca>\n").unwrap();
        assert_eq!(cfg.certificate(SectionTag::Ca), Some("LINE1\nLINE2\n"));
    }

    #[test]
    fn test_section_preserves_blank_lines() {
        let cfg = parse_config("remote h 1\n<key>\nA\n\nB\n</key>\n").unwrap();
        assert_eq!(cfg.certificate(SectionTag::Key), Some("A\n\nB\n"));
    }

    #[test]
    fn test_tls_crypt_section_is_captured() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.certificate(SectionTag::TlsCrypt), Some("abcdef\n"));
    }

    #[test]
    fn test_unrecognised_tag_closes_current_section() {
        // Arrange: <extra-certs> is not captured and ends the <ca> body
        let text = "remote h 1\n<ca>\nCA1\n<extra-certs>\nEXTRA\n</extra-certs>\n";

        // Act
        let cfg = parse_config(text).unwrap();

        // Assert
        assert_eq!(cfg.certificate(SectionTag::Ca), Some("CA1\n"));
        assert_eq!(cfg.certificates.len(), 1);
    }

    #[test]
    fn test_body_line_starting_with_angle_bracket_stays_in_section() {
        // Arrange
        let text = "remote h 1\n<ca>\nA\n<not a tag\nB\n</ca>\n";

        // Act
        let cfg = parse_config(text).unwrap();

        // Assert
        assert_eq!(cfg.certificate(SectionTag::Ca), Some("A\n<not a tag\nB\n"));
    }

    #[test]
    fn test_crlf_document_produces_clean_blobs() {
        let text = "remote h 1 udp\r\n<cert>\r\nC1\r\n</cert>\r\n";
        let cfg = parse_config(text).unwrap();
        assert_eq!(cfg.remotes[0].proto, "udp");
        assert_eq!(cfg.certificate(SectionTag::Cert), Some("C1\n"));
    }

    // ── Raw retention ─────────────────────────────────────────────────────────

    #[test]
    fn test_raw_is_kept_verbatim() {
        let text = "  remote h 1  \n\n# comment\nunknown directive\n";
        let cfg = parse_config(text).unwrap();
        assert_eq!(cfg.raw, text);
    }

    #[test]
    fn test_parse_is_deterministic() {
        assert_eq!(parse_config(SAMPLE), parse_config(SAMPLE));
    }

    // ── Display helpers ───────────────────────────────────────────────────────

    #[test]
    fn test_summary_lists_server_cipher_and_auth() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(
            cfg.summary(),
            vec![
                "Server: vpn.example.com:1194 (udp)".to_string(),
                "Cipher: AES-256-GCM".to_string(),
                "Auth: Username/Password".to_string(),
            ]
        );
    }

    // ── Persisted record ──────────────────────────────────────────────────────

    #[test]
    fn test_persisted_record_decodes_back_to_same_config() {
        let cfg = parse_config(SAMPLE).unwrap();
        let json = cfg.to_persisted().unwrap();
        assert_eq!(ParsedConfig::from_persisted(&json).unwrap(), cfg);
    }

    #[test]
    fn test_persisted_auth_method_uses_kebab_name() {
        let cfg = parse_config("remote h 1\nauth-user-pass\n").unwrap();
        let json = cfg.to_persisted().unwrap();
        assert!(json.contains(r#""auth_method":"user-pass""#), "got {json}");
    }

    #[test]
    fn test_garbage_record_is_persistence_corrupt() {
        let result = ParsedConfig::from_persisted("{not json");
        assert!(matches!(result, Err(ParseFailure::PersistenceCorrupt(_))));
    }

    #[test]
    fn test_record_without_remotes_is_persistence_corrupt() {
        let result = ParsedConfig::from_persisted(r#"{"remotes":[],"raw":"x"}"#);
        assert!(matches!(result, Err(ParseFailure::PersistenceCorrupt(_))));
    }
}
