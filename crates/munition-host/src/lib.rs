//! The standard host function table for munition.
//!
//! Guest modules import these functions from the `env` namespace; each is
//! gated by a capability and included in the import set only when that
//! capability was granted. Implementations are written against the
//! engine-neutral [`HostContext`] seam and never re-check capabilities —
//! enforcement happened at link time.
//!
//! # Functions
//!
//! | Import | Capability |
//! |---|---|
//! | `env::log(level, ptr, len)` | `host_call` |
//! | `env::clock_ns() -> i64` | `time` |
//! | `env::random_fill(ptr, len)` | `random` |
//! | `env::fs_read(path_ptr, path_len, buf_ptr, buf_cap) -> i32` | `filesystem_read` |
//! | `env::fs_write(path_ptr, path_len, data_ptr, data_len) -> i32` | `filesystem_write` |
//! | `env::net_probe(host_ptr, host_len, port) -> i32` | `network` |

pub mod clock;
pub mod entropy;
pub mod fs;
pub mod logging;
pub mod net;
pub mod table;

pub use table::{standard_table, STANDARD_ENTRIES};

use munition_common::HostError;
use munition_core::Value;

/// Fetch argument `index` as an `i32`.
pub(crate) fn arg_i32(args: &[Value], index: usize) -> Result<i32, HostError> {
    args.get(index)
        .and_then(Value::as_i32)
        .ok_or_else(|| HostError::invalid_argument(format!("argument {index} must be i32")))
}

/// Fetch argument `index` as an `i32` and require it non-negative
/// (pointers and lengths).
pub(crate) fn arg_u32(args: &[Value], index: usize) -> Result<u32, HostError> {
    let value = arg_i32(args, index)?;
    u32::try_from(value)
        .map_err(|_| HostError::invalid_argument(format!("argument {index} must be non-negative")))
}

#[cfg(test)]
pub(crate) mod testctx {
    //! A byte-buffer host context for exercising native implementations
    //! without an engine.

    use munition_common::{HostConfig, HostError};
    use munition_core::{GuestLogLevel, HostContext};

    pub struct MockHostContext {
        pub memory: Vec<u8>,
        pub logs: Vec<(GuestLogLevel, String)>,
        pub config: HostConfig,
    }

    impl MockHostContext {
        pub fn new(memory_len: usize) -> Self {
            Self {
                memory: vec![0; memory_len],
                logs: Vec::new(),
                config: HostConfig::default(),
            }
        }

        pub fn with_fs_root(mut self, root: impl Into<std::path::PathBuf>) -> Self {
            self.config.fs_root = Some(root.into());
            self
        }

        /// Place bytes into mock guest memory at `offset`.
        pub fn plant(&mut self, offset: usize, bytes: &[u8]) {
            self.memory[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
    }

    impl HostContext for MockHostContext {
        fn read_guest(&mut self, offset: u32, len: u32) -> Result<Vec<u8>, HostError> {
            let start = offset as usize;
            let end = start
                .checked_add(len as usize)
                .filter(|&end| end <= self.memory.len())
                .ok_or_else(|| HostError::guest_memory("read out of bounds"))?;
            Ok(self.memory[start..end].to_vec())
        }

        fn write_guest(&mut self, offset: u32, data: &[u8]) -> Result<(), HostError> {
            let start = offset as usize;
            let end = start
                .checked_add(data.len())
                .filter(|&end| end <= self.memory.len())
                .ok_or_else(|| HostError::guest_memory("write out of bounds"))?;
            self.memory[start..end].copy_from_slice(data);
            Ok(())
        }

        fn guest_log(&mut self, level: GuestLogLevel, message: &str) {
            self.logs.push((level, message.to_string()));
        }

        fn host_config(&self) -> &munition_common::HostConfig {
            &self.config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_helpers() {
        let args = [Value::I32(7), Value::I32(-1), Value::I64(3)];

        assert_eq!(arg_i32(&args, 0).unwrap(), 7);
        assert_eq!(arg_u32(&args, 0).unwrap(), 7);
        assert!(arg_u32(&args, 1).is_err());
        assert!(arg_i32(&args, 2).is_err());
        assert!(arg_i32(&args, 9).is_err());
    }
}
