//! Configuration file structures for munition.
//!
//! This module defines the TOML configuration file surface:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`ConfigFileError`]: Load/parse failures

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RuntimeConfig;

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [runtime.engine]
/// epoch_interruption = true
///
/// [runtime.invocation]
/// default_fuel = 100_000
/// default_timeout_ms = 5_000
///
/// [runtime.host]
/// fs_root = "./sandbox"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Runtime configuration (engine + invocation + host settings).
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();

        assert_eq!(config.runtime.invocation.default_fuel, 100_000);
        assert!(config.runtime.host.fs_root.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [runtime.invocation]
            default_fuel = 10_000
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(config.runtime.invocation.default_fuel, 10_000);
        // Defaults applied
        assert_eq!(config.runtime.invocation.default_timeout_ms, 5_000);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [runtime.engine]
            epoch_interruption = false
            wasm_backtrace = true

            [runtime.invocation]
            default_fuel = 50_000
            default_timeout_ms = 250
            interrupt_grace_ms = 20
            max_dump_memory_pages = 4

            [runtime.host]
            fs_root = "./sandbox"
            max_guest_log_bytes = 1024
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert!(!config.runtime.engine.epoch_interruption);
        assert!(config.runtime.engine.wasm_backtrace);
        assert_eq!(config.runtime.invocation.default_fuel, 50_000);
        assert_eq!(config.runtime.invocation.default_timeout_ms, 250);
        assert_eq!(config.runtime.invocation.interrupt_grace_ms, 20);
        assert_eq!(config.runtime.invocation.max_dump_memory_pages, Some(4));
        assert_eq!(
            config.runtime.host.fs_root.as_deref(),
            Some(std::path::Path::new("./sandbox"))
        );
        assert_eq!(config.runtime.host.max_guest_log_bytes, 1024);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let invalid = "this is not valid toml [";
        let result = ConfigFile::from_toml(invalid);
        assert!(result.is_err());
    }
}
