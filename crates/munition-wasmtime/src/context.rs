//! Per-invocation store context and the `Caller`-backed host context.
//!
//! [`SandboxContext`] is the data every Wasmtime store carries: the host
//! environment configuration, the guest's log entries, and the fuel
//! budget the invocation started with. It is created fresh per
//! invocation and dies with the store.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use wasmtime::{Caller, Memory};

use munition_common::{HostConfig, HostError};
use munition_core::{GuestLogLevel, HostContext};

/// A single log entry emitted by guest code.
#[derive(Debug, Clone)]
pub struct GuestLogEntry {
    /// Log level.
    pub level: GuestLogLevel,
    /// Message content.
    pub message: String,
}

/// Per-invocation state accessible from host functions.
pub struct SandboxContext {
    host: Arc<HostConfig>,
    /// Logs collected from guest code.
    pub logs: Vec<GuestLogEntry>,
    /// The fuel budget the store was created with.
    pub(crate) initial_fuel: u64,
}

impl SandboxContext {
    /// Create a fresh context.
    pub fn new(host: Arc<HostConfig>, initial_fuel: u64) -> Self {
        Self {
            host,
            logs: Vec::new(),
            initial_fuel,
        }
    }

    /// The host environment configuration.
    pub fn host_config(&self) -> &HostConfig {
        &self.host
    }

    /// Record a guest log entry and re-emit it through `tracing`.
    pub fn log(&mut self, level: GuestLogLevel, message: &str) {
        self.logs.push(GuestLogEntry {
            level,
            message: message.to_string(),
        });

        match level {
            GuestLogLevel::Debug => debug!(guest_log = true, "{message}"),
            GuestLogLevel::Info => info!(guest_log = true, "{message}"),
            GuestLogLevel::Warn => warn!(guest_log = true, "{message}"),
            GuestLogLevel::Error => error!(guest_log = true, "{message}"),
        }
    }
}

/// [`HostContext`] over a live Wasmtime caller.
///
/// Guest memory access goes through the module's exported `memory`;
/// modules without one get a clean error instead of a panic.
pub(crate) struct CallerHostContext<'a, 'b> {
    pub(crate) caller: &'a mut Caller<'b, SandboxContext>,
    pub(crate) memory: Option<Memory>,
}

impl CallerHostContext<'_, '_> {
    fn memory(&self) -> Result<Memory, HostError> {
        self.memory
            .ok_or_else(|| HostError::guest_memory("module exports no memory"))
    }

    fn checked_range(
        data_len: usize,
        offset: u32,
        len: usize,
    ) -> Result<std::ops::Range<usize>, HostError> {
        let start = offset as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= data_len)
            .ok_or_else(|| {
                HostError::guest_memory(format!(
                    "range {start}..{} exceeds memory of {data_len} bytes",
                    start.saturating_add(len)
                ))
            })?;
        Ok(start..end)
    }
}

impl HostContext for CallerHostContext<'_, '_> {
    fn read_guest(&mut self, offset: u32, len: u32) -> Result<Vec<u8>, HostError> {
        let memory = self.memory()?;
        let data = memory.data(&self.caller);
        let range = Self::checked_range(data.len(), offset, len as usize)?;
        Ok(data[range].to_vec())
    }

    fn write_guest(&mut self, offset: u32, bytes: &[u8]) -> Result<(), HostError> {
        let memory = self.memory()?;
        let data = memory.data_mut(&mut self.caller);
        let range = Self::checked_range(data.len(), offset, bytes.len())?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    fn guest_log(&mut self, level: GuestLogLevel, message: &str) {
        self.caller.data_mut().log(level, message);
    }

    fn host_config(&self) -> &HostConfig {
        self.caller.data().host_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_collects_logs() {
        let mut ctx = SandboxContext::new(Arc::new(HostConfig::default()), 1_000);

        ctx.log(GuestLogLevel::Info, "hello");
        ctx.log(GuestLogLevel::Error, "world");

        assert_eq!(ctx.logs.len(), 2);
        assert_eq!(ctx.logs[0].level, GuestLogLevel::Info);
        assert_eq!(ctx.logs[0].message, "hello");
        assert_eq!(ctx.logs[1].level, GuestLogLevel::Error);
        assert_eq!(ctx.initial_fuel, 1_000);
    }

    #[test]
    fn test_checked_range() {
        assert_eq!(
            CallerHostContext::checked_range(100, 10, 20).unwrap(),
            10..30
        );
        assert!(CallerHostContext::checked_range(100, 90, 20).is_err());
        assert!(CallerHostContext::checked_range(100, u32::MAX, 1).is_err());
    }
}
