//! Forensic capture: turn a live or trapped sandbox into an immutable
//! dump, atomically and before any cleanup.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::caps::CapabilitySet;
use crate::dump::{CrashCause, DumpMemory, ForensicDump};
use crate::runtime::Runtime;
use crate::value::Value;

/// Size of one WebAssembly linear memory page.
pub const WASM_PAGE_BYTES: u64 = 65_536;

/// Invocation context a dump records besides the sandbox observation.
#[derive(Debug)]
pub struct CaptureContext<'a> {
    /// Invoked function name.
    pub function: &'a str,
    /// Invocation arguments.
    pub args: &'a [Value],
    /// Capabilities as the caller requested them, unexpanded.
    pub requested_capabilities: &'a [String],
    /// The effective granted set.
    pub granted_capabilities: &'a CapabilitySet,
    /// The fuel budget the invocation started with.
    pub initial_fuel: u64,
    /// When the invocation started.
    pub started: Instant,
    /// Dump memory bound in 64 KiB pages; `None` captures full memory.
    pub max_memory_pages: Option<u32>,
}

/// Capture a dump from a sandbox whose store is still observable.
///
/// The sequence is strictly: fuel, globals, memory, compress, timestamp.
/// Nothing here mutates the store. A failed memory read degrades the dump
/// (empty memory plus a note) instead of masking `cause`.
pub fn capture<R: Runtime>(
    runtime: &R,
    sandbox: &mut R::Sandbox,
    cause: CrashCause,
    ctx: &CaptureContext<'_>,
) -> ForensicDump {
    let fuel_consumed = runtime.fuel_consumed(sandbox);
    let globals = runtime.read_globals(sandbox);

    let memory_size = runtime.memory_size(sandbox);
    let limit = ctx
        .max_memory_pages
        .map_or(memory_size, |pages| u64::from(pages) * WASM_PAGE_BYTES);
    let to_read = memory_size.min(limit);
    let truncated = to_read < memory_size;

    let mut note = None;
    let memory = if to_read == 0 {
        DumpMemory {
            truncated,
            ..DumpMemory::empty()
        }
    } else {
        match runtime.read_memory(sandbox, 0, to_read) {
            Ok(raw) => DumpMemory::compress(&raw, truncated),
            Err(err) => {
                warn!(error = %err, "memory capture failed; emitting degraded dump");
                note = Some(format!("memory capture failed: {err}"));
                DumpMemory::empty()
            }
        }
    };

    debug!(
        cause = cause.label(),
        fuel_consumed,
        memory_bytes = to_read,
        truncated,
        "forensic capture complete"
    );

    finish(cause, ctx, fuel_consumed, globals, memory, note)
}

/// Build a dump for a failure where no instance ever existed (validation,
/// compile, and link failures) or where the sandbox could not be
/// recovered. Memory and globals are empty.
pub fn capture_unborn(
    cause: CrashCause,
    ctx: &CaptureContext<'_>,
    fuel_consumed: u64,
    note: Option<String>,
) -> ForensicDump {
    finish(cause, ctx, fuel_consumed, Vec::new(), DumpMemory::empty(), note)
}

fn finish(
    cause: CrashCause,
    ctx: &CaptureContext<'_>,
    fuel_consumed: u64,
    globals: Vec<Value>,
    memory: DumpMemory,
    note: Option<String>,
) -> ForensicDump {
    ForensicDump {
        cause,
        fuel_consumed,
        fuel_remaining: ctx.initial_fuel.saturating_sub(fuel_consumed),
        wall_time_ns: ctx.started.elapsed().as_nanos() as u64,
        captured_at_ns: timestamp_ns(),
        function: ctx.function.to_string(),
        args: ctx.args.to_vec(),
        requested_capabilities: ctx.requested_capabilities.to_vec(),
        granted_capabilities: ctx.granted_capabilities.clone(),
        globals,
        memory,
        capture_note: note,
    }
}

fn timestamp_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
