//! Munition: a capability-attenuation framework for executing untrusted
//! WebAssembly.
//!
//! Every invocation runs under three guarantees:
//! - **Bounded execution** — fuel metering plus a wall-clock timeout.
//! - **Per-invocation isolation** — fresh module, instance, and store per
//!   call; no state flows between calls.
//! - **Forensic capture** — any abnormal termination yields an immutable
//!   [`ForensicDump`] (cause, fuel, wall time, compressed linear memory,
//!   globals), taken before cleanup.
//!
//! Host imports are capability-gated at link time: a host function is
//! present in the import set only when its capability was granted, so a
//! module that imports a denied function fails instantiation
//! deterministically with `host_denied` — denied code never runs.
//!
//! # Example
//!
//! ```ignore
//! use munition::{fire, FireOptions, InvocationResult};
//!
//! let wasm = std::fs::read("guest.wasm")?;
//! let options = FireOptions::default()
//!     .with_fuel(100_000)
//!     .with_timeout_ms(1_000)
//!     .with_capabilities(["time", "host_call"]);
//!
//! match fire(&wasm, "run", &[], options).await {
//!     InvocationResult::Ok { values, metadata } => {
//!         println!("ok: {values:?} ({} fuel left)", metadata.fuel_remaining);
//!     }
//!     InvocationResult::Crash(dump) => {
//!         std::fs::write("crash.mdmp", dump.encode()?)?;
//!     }
//! }
//! ```

pub use munition_common::{
    CompileError, ConfigFile, ConfigFileError, EngineConfig, HostConfig, InvocationConfig,
    RuntimeConfig, TrapError, TrapKind,
};
pub use munition_core::{
    Capability, CapabilitySet, CrashCause, FireOptions, ForensicDump, FuelPolicy, InstanceManager,
    InvocationMetadata, InvocationResult, Value,
};
pub use munition_host::standard_table;
pub use munition_wasmtime::WasmtimeRuntime;

/// A manager over the default Wasmtime runtime.
pub type Munition = InstanceManager<WasmtimeRuntime>;

/// Build a manager over the default runtime and the standard host table.
pub fn manager(config: &RuntimeConfig) -> Munition {
    InstanceManager::new(
        WasmtimeRuntime::new(config),
        standard_table(),
        config.invocation.clone(),
    )
}

/// Execute one invocation with default configuration.
///
/// See [`InstanceManager::fire`] for the full contract.
pub async fn fire(
    wasm: &[u8],
    function: &str,
    args: &[Value],
    options: FireOptions,
) -> InvocationResult {
    manager(&RuntimeConfig::default())
        .fire(wasm, function, args, options)
        .await
}

/// Check that `wasm` compiles, without instantiating or running it.
///
/// # Errors
///
/// Returns the compile diagnostic for invalid modules.
pub fn validate(wasm: &[u8]) -> Result<(), CompileError> {
    manager(&RuntimeConfig::default()).validate(wasm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_surface() {
        assert!(validate(b"junk").is_err());

        let minimal = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        assert!(validate(&minimal).is_ok());
    }

    #[test]
    fn test_manager_construction() {
        let mgr = manager(&RuntimeConfig::default());
        assert_eq!(mgr.fuel_policy().default_fuel(), 100_000);
    }
}
