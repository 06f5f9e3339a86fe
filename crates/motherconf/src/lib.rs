//! Minimal configuration loading for Mothership.
//!
//! This crate provides configuration loading with minimal dependencies,
//! designed to be imported by all Mothership crates without causing
//! circular dependency issues.
//!
//! # Usage
//!
//! ```rust,no_run
//! use motherconf::MotherConfig;
//!
//! let config = MotherConfig::load().expect("Failed to load config");
//!
//! println!("CAS dir: {}", config.paths.cas_dir.display());
//! println!("HTTP port: {}", config.bind.http_port);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/mothership/config.toml` (system)
//! 2. `~/.config/mothership/config.toml` (user)
//! 3. `./mothership.toml` (local override)
//! 4. Environment variables (`MOTHERSHIP_*`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! state_dir = "~/.local/share/mothership"
//! cas_dir = "~/.mothership/cas"
//!
//! [bind]
//! http_addr = "127.0.0.1"
//! http_port = 8021
//!
//! [telemetry]
//! log_level = "info"
//!
//! [auth.tokens]
//! # token = owner
//! "s3cret-token" = "alice"
//! ```

pub mod infra;
pub mod loader;

pub use infra::{AuthConfig, BindConfig, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete Mothership configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MotherConfig {
    /// Filesystem paths.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Network bind address.
    #[serde(default)]
    pub bind: BindConfig,

    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Bearer-token authentication.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl MotherConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/mothership/config.toml`
    /// 3. `~/.config/mothership/config.toml`
    /// 4. `./mothership.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./mothership.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about sources.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = MotherConfig::default();

        // Load config files in order
        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        // Apply environment variable overrides
        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for nicer formatting
        let mut output = String::new();

        output.push_str("# Mothership Configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "state_dir = \"{}\"\n",
            self.paths.state_dir.display()
        ));
        output.push_str(&format!("cas_dir = \"{}\"\n", self.paths.cas_dir.display()));

        output.push_str("\n[bind]\n");
        output.push_str(&format!("http_addr = \"{}\"\n", self.bind.http_addr));
        output.push_str(&format!("http_port = {}\n", self.bind.http_port));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output.push_str("\n[auth.tokens]\n");
        for (token, owner) in &self.auth.tokens {
            output.push_str(&format!("\"{}\" = \"{}\"\n", token, owner));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MotherConfig::default();
        assert_eq!(config.bind.http_port, 8021);
        assert!(config.auth.single_tenant());
    }

    #[test]
    fn test_to_toml() {
        let config = MotherConfig::default();
        let toml = config.to_toml();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[bind]"));
        assert!(toml.contains("[auth.tokens]"));
    }

    #[test]
    fn test_load_defaults() {
        // Load should work even with no config files
        let config = MotherConfig::load().unwrap();
        assert!(!config.bind.http_addr.is_empty());
    }
}
