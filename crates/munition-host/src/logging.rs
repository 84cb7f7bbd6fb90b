//! The `env::log` host function.
//!
//! Guest protocol: `log(level: i32, ptr: i32, len: i32)` where `level` is
//! `0=debug, 1=info, 2=warn, 3=error` and `ptr`/`len` locate a UTF-8
//! message in guest memory. Messages are recorded in the invocation
//! context and re-emitted through `tracing`.

use munition_common::HostError;
use munition_core::{GuestLogLevel, HostContext, Value};

use crate::{arg_i32, arg_u32};

/// Native implementation of `env::log`.
pub fn log_native(ctx: &mut dyn HostContext, args: &[Value]) -> Result<Vec<Value>, HostError> {
    let level = GuestLogLevel::from_i32(arg_i32(args, 0)?);
    let ptr = arg_u32(args, 1)?;
    let len = arg_u32(args, 2)?;

    let bytes = ctx.read_guest(ptr, len)?;
    let message = String::from_utf8_lossy(&bytes);
    let message = truncate_utf8(&message, ctx.host_config().max_guest_log_bytes);

    ctx.guest_log(level, message);
    Ok(Vec::new())
}

/// Truncate at a UTF-8 boundary so the result stays valid.
fn truncate_utf8(message: &str, max_bytes: usize) -> &str {
    if message.len() <= max_bytes {
        return message;
    }
    let mut end = max_bytes;
    while end > 0 && !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}
