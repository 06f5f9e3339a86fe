//! Config file discovery, loading, and environment variable overlay.

use crate::infra::{BindConfig, PathsConfig, TelemetryConfig};
use crate::{ConfigError, MotherConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // System config
    let system = PathBuf::from("/etc/mothership/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("mothership/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    // Local override (current directory)
    let local = PathBuf::from("mothership.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<MotherConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse config from TOML string.
pub(crate) fn parse_toml(contents: &str, path: &Path) -> Result<MotherConfig, ConfigError> {
    // Parse as raw TOML table first so paths can be tilde-expanded
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut config = MotherConfig::default();

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("state_dir").and_then(|v| v.as_str()) {
            config.paths.state_dir = expand_path(v);
        }
        if let Some(v) = paths.get("cas_dir").and_then(|v| v.as_str()) {
            config.paths.cas_dir = expand_path(v);
        }
    }

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("http_addr").and_then(|v| v.as_str()) {
            config.bind.http_addr = v.to_string();
        }
        if let Some(v) = bind.get("http_port").and_then(|v| v.as_integer()) {
            config.bind.http_port = v as u16;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
    }

    if let Some(auth) = table.get("auth").and_then(|v| v.as_table()) {
        if let Some(tokens) = auth.get("tokens").and_then(|v| v.as_table()) {
            for (token, owner) in tokens {
                if let Some(owner) = owner.as_str() {
                    config.auth.tokens.insert(token.clone(), owner.to_string());
                }
            }
        }
    }

    Ok(config)
}

/// Merge two configs, with `overlay` taking precedence for any value that
/// differs from the compiled default.
pub fn merge_configs(base: MotherConfig, overlay: MotherConfig) -> MotherConfig {
    fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
        if overlay != default {
            overlay
        } else {
            base
        }
    }

    let paths_default = PathsConfig::default();
    let bind_default = BindConfig::default();
    let telemetry_default = TelemetryConfig::default();

    let mut auth = base.auth;
    for (token, owner) in overlay.auth.tokens {
        auth.tokens.insert(token, owner);
    }

    MotherConfig {
        paths: PathsConfig {
            state_dir: pick(
                base.paths.state_dir,
                overlay.paths.state_dir,
                paths_default.state_dir,
            ),
            cas_dir: pick(
                base.paths.cas_dir,
                overlay.paths.cas_dir,
                paths_default.cas_dir,
            ),
        },
        bind: BindConfig {
            http_addr: pick(
                base.bind.http_addr,
                overlay.bind.http_addr,
                bind_default.http_addr,
            ),
            http_port: pick(
                base.bind.http_port,
                overlay.bind.http_port,
                bind_default.http_port,
            ),
        },
        telemetry: TelemetryConfig {
            log_level: pick(
                base.telemetry.log_level,
                overlay.telemetry.log_level,
                telemetry_default.log_level,
            ),
        },
        auth,
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut MotherConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("MOTHERSHIP_STATE_DIR") {
        config.paths.state_dir = expand_path(&v);
        sources.env_overrides.push("MOTHERSHIP_STATE_DIR".to_string());
    }
    if let Ok(v) = env::var("MOTHERSHIP_CAS_DIR") {
        config.paths.cas_dir = expand_path(&v);
        sources.env_overrides.push("MOTHERSHIP_CAS_DIR".to_string());
    }

    if let Ok(v) = env::var("MOTHERSHIP_HTTP_ADDR") {
        config.bind.http_addr = v;
        sources.env_overrides.push("MOTHERSHIP_HTTP_ADDR".to_string());
    }
    if let Ok(v) = env::var("MOTHERSHIP_HTTP_PORT") {
        if let Ok(port) = v.parse() {
            config.bind.http_port = port;
            sources.env_overrides.push("MOTHERSHIP_HTTP_PORT".to_string());
        }
    }

    if let Ok(v) = env::var("MOTHERSHIP_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("MOTHERSHIP_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    // Token grants (MOTHERSHIP_TOKEN_<OWNER>=<token>)
    for (key, value) in env::vars() {
        if let Some(owner) = key.strip_prefix("MOTHERSHIP_TOKEN_") {
            let owner = owner.to_lowercase();
            config.auth.tokens.insert(value, owner);
            sources.env_overrides.push(key);
        }
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[paths]
state_dir = "/custom/state"
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.paths.state_dir, PathBuf::from("/custom/state"));
        // Other values should be defaults
        assert_eq!(config.bind.http_port, 8021);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[paths]
state_dir = "/data/mothership"
cas_dir = "/data/cas"

[bind]
http_addr = "0.0.0.0"
http_port = 9000

[telemetry]
log_level = "debug"

[auth.tokens]
s3cret-alice = "alice"
s3cret-bob = "bob"
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.paths.state_dir, PathBuf::from("/data/mothership"));
        assert_eq!(config.paths.cas_dir, PathBuf::from("/data/cas"));
        assert_eq!(config.bind.http_addr, "0.0.0.0");
        assert_eq!(config.bind.http_port, 9000);
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.auth.owner_for("s3cret-alice"), Some("alice"));
        assert_eq!(config.auth.owner_for("s3cret-bob"), Some("bob"));
    }

    #[test]
    fn test_merge_overlay_wins_where_set() {
        let base = parse_toml(
            r#"
[bind]
http_port = 9000

[auth.tokens]
t1 = "alice"
"#,
            Path::new("base.toml"),
        )
        .unwrap();
        let overlay = parse_toml(
            r#"
[telemetry]
log_level = "debug"

[auth.tokens]
t2 = "bob"
"#,
            Path::new("overlay.toml"),
        )
        .unwrap();

        let merged = merge_configs(base, overlay);
        assert_eq!(merged.bind.http_port, 9000);
        assert_eq!(merged.telemetry.log_level, "debug");
        assert_eq!(merged.auth.owner_for("t1"), Some("alice"));
        assert_eq!(merged.auth.owner_for("t2"), Some("bob"));
    }
}
