//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Filesystem paths for Mothership state and data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for runtime state (record snapshot).
    /// Default: ~/.local/share/mothership
    #[serde(default = "PathsConfig::default_state_dir")]
    pub state_dir: PathBuf,

    /// Content-addressable storage directory.
    /// Default: ~/.mothership/cas
    #[serde(default = "PathsConfig::default_cas_dir")]
    pub cas_dir: PathBuf,
}

impl PathsConfig {
    fn default_state_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/mothership"))
            .unwrap_or_else(|| PathBuf::from(".local/share/mothership"))
    }

    fn default_cas_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".mothership/cas"))
            .unwrap_or_else(|| PathBuf::from(".mothership/cas"))
    }

    /// Location of the record index snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.state_dir.join("records.json")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: Self::default_state_dir(),
            cas_dir: Self::default_cas_dir(),
        }
    }
}

/// Network bind address for this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindConfig {
    /// HTTP listen address.
    /// Default: 127.0.0.1
    #[serde(default = "BindConfig::default_http_addr")]
    pub http_addr: String,

    /// HTTP port for records, blobs, and health endpoints.
    /// Default: 8021
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,
}

impl BindConfig {
    fn default_http_addr() -> String {
        "127.0.0.1".to_string()
    }

    fn default_http_port() -> u16 {
        8021
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            http_addr: Self::default_http_addr(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Bearer-token authentication.
///
/// Maps tokens to owner names. With no tokens configured the daemon runs
/// single-tenant: every request is served as the default owner, which is
/// the right mode for a personal store on localhost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// token -> owner
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

impl AuthConfig {
    /// Owner name used when no tokens are configured.
    pub const DEFAULT_OWNER: &'static str = "default";

    pub fn single_tenant(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Resolve a bearer token to an owner, if it is known.
    pub fn owner_for(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_defaults() {
        let paths = PathsConfig::default();
        assert!(paths.state_dir.to_string_lossy().contains("mothership"));
        assert!(paths.cas_dir.to_string_lossy().contains("mothership"));
        assert!(paths.snapshot_path().ends_with("records.json"));
    }

    #[test]
    fn test_bind_defaults() {
        let bind = BindConfig::default();
        assert_eq!(bind.http_addr, "127.0.0.1");
        assert_eq!(bind.http_port, 8021);
    }

    #[test]
    fn test_auth_defaults_to_single_tenant() {
        let auth = AuthConfig::default();
        assert!(auth.single_tenant());
        assert_eq!(auth.owner_for("anything"), None);
    }

    #[test]
    fn test_auth_token_lookup() {
        let mut auth = AuthConfig::default();
        auth.tokens.insert("s3cret".to_string(), "alice".to_string());
        assert!(!auth.single_tenant());
        assert_eq!(auth.owner_for("s3cret"), Some("alice"));
        assert_eq!(auth.owner_for("nope"), None);
    }
}
