//! Configuration structures for munition.
//!
//! This module defines configuration options for the framework:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Engine backend settings
//! - [`InvocationConfig`]: Per-invocation defaults (fuel, timeout, dump bounds)
//! - [`HostConfig`]: Host function environment (filesystem root, log limits)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// These settings affect only defaults, never the invocation contract:
/// callers can override fuel, timeout, and dump bounds per `fire` call.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Engine backend configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-invocation defaults.
    #[serde(default)]
    pub invocation: InvocationConfig,

    /// Host function environment.
    #[serde(default)]
    pub host: HostConfig,
}

/// Engine backend configuration.
///
/// Fuel metering is not configurable: an engine without it cannot satisfy
/// the runtime contract, so it is always on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable epoch-based interruption.
    ///
    /// Required for the timeout guarantee; disable only when a caller
    /// enforces wall-clock bounds by other means.
    #[serde(default = "defaults::epoch_interruption")]
    pub epoch_interruption: bool,

    /// Capture wasm backtraces in trap messages.
    ///
    /// Off by default; backtraces bloat trap messages and therefore dumps.
    #[serde(default = "defaults::wasm_backtrace")]
    pub wasm_backtrace: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epoch_interruption: defaults::epoch_interruption(),
            wasm_backtrace: defaults::wasm_backtrace(),
        }
    }
}

/// Per-invocation defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvocationConfig {
    /// Default fuel budget when an invocation does not specify one.
    #[serde(default = "defaults::default_fuel")]
    pub default_fuel: u64,

    /// Default wall-clock timeout in milliseconds.
    #[serde(default = "defaults::default_timeout_ms")]
    pub default_timeout_ms: u32,

    /// After interrupting a timed-out invocation, how long to wait for the
    /// engine to surface the store before returning a degraded dump.
    #[serde(default = "defaults::interrupt_grace_ms")]
    pub interrupt_grace_ms: u64,

    /// Upper bound on linear memory captured into a dump, in 64 KiB pages.
    ///
    /// `None` captures full memory. When the bound clamps a capture, the
    /// dump's `memory_truncated` flag is set.
    #[serde(default)]
    pub max_dump_memory_pages: Option<u32>,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            default_fuel: defaults::default_fuel(),
            default_timeout_ms: defaults::default_timeout_ms(),
            interrupt_grace_ms: defaults::interrupt_grace_ms(),
            max_dump_memory_pages: None,
        }
    }
}

impl InvocationConfig {
    /// Get the default timeout as a `Duration`.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.default_timeout_ms))
    }

    /// Get the interrupt grace period as a `Duration`.
    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_millis(self.interrupt_grace_ms)
    }
}

/// Host function environment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Root directory for guest filesystem access.
    ///
    /// Guest paths resolve relative to this directory and may not escape
    /// it. When unset, `fs_read`/`fs_write` report failure to the guest
    /// even if the capability was granted.
    #[serde(default)]
    pub fs_root: Option<PathBuf>,

    /// Maximum bytes of a single guest log message; longer messages are
    /// truncated at a UTF-8 boundary.
    #[serde(default = "defaults::max_guest_log_bytes")]
    pub max_guest_log_bytes: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            fs_root: None,
            max_guest_log_bytes: defaults::max_guest_log_bytes(),
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn epoch_interruption() -> bool {
        true
    }

    pub const fn wasm_backtrace() -> bool {
        false
    }

    pub const fn default_fuel() -> u64 {
        100_000
    }

    pub const fn default_timeout_ms() -> u32 {
        5_000
    }

    pub const fn interrupt_grace_ms() -> u64 {
        100
    }

    pub const fn max_guest_log_bytes() -> usize {
        4_096
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();

        assert!(config.engine.epoch_interruption);
        assert!(!config.engine.wasm_backtrace);

        assert_eq!(config.invocation.default_fuel, 100_000);
        assert_eq!(config.invocation.default_timeout_ms, 5_000);
        assert_eq!(config.invocation.interrupt_grace_ms, 100);
        assert!(config.invocation.max_dump_memory_pages.is_none());

        assert!(config.host.fs_root.is_none());
        assert_eq!(config.host.max_guest_log_bytes, 4_096);
    }

    #[test]
    fn test_config_serialization() {
        let config = RuntimeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RuntimeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            config.invocation.default_fuel,
            deserialized.invocation.default_fuel
        );
        assert_eq!(
            config.engine.epoch_interruption,
            deserialized.engine.epoch_interruption
        );
    }

    #[test]
    fn test_invocation_durations() {
        let config = InvocationConfig {
            default_timeout_ms: 500,
            interrupt_grace_ms: 50,
            ..Default::default()
        };

        assert_eq!(config.default_timeout(), Duration::from_millis(500));
        assert_eq!(config.interrupt_grace(), Duration::from_millis(50));
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"invocation": {"default_fuel": 10000}}"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();

        // Explicitly set value
        assert_eq!(config.invocation.default_fuel, 10_000);
        // Default values for unspecified fields
        assert_eq!(config.invocation.default_timeout_ms, 5_000);
        assert!(config.engine.epoch_interruption);
    }
}
