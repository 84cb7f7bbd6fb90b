//! Wasmtime backend for the munition runtime contract.
//!
//! This crate provides [`WasmtimeRuntime`], the default engine behind
//! the instance manager:
//! - fuel metering via Wasmtime's `consume_fuel`
//! - timeout interruption via epoch bumping (preset one-tick deadline,
//!   invocation-local engine)
//! - engine trap classification into the framework's trap taxonomy
//! - post-trap store observation (`read_memory`, `read_globals`) for
//!   forensic capture
//!
//! Modules, stores, and engines are all per-invocation; nothing is pooled
//! or shared.

mod binder;
pub mod context;
pub mod runtime;

pub use context::{GuestLogEntry, SandboxContext};
pub use runtime::{EpochInterrupter, WasmtimeModule, WasmtimeRuntime, WasmtimeSandbox};
