//! The instance manager: drives the compile → instantiate → invoke →
//! capture → cleanup lifecycle for a single invocation.
//!
//! One invocation moves through
//! `Validating → Compiling → Linking → Instantiating → Running` and ends
//! in `Completed`, or detours through `Capturing` into `Crashed`. Capture
//! always happens before cleanup; cleanup always happens before `fire`
//! returns (with one documented exception when a worker ignores
//! interruption past the grace window).
//!
//! Invocations are independent: fresh module, instance, and store per
//! call, no pooling, no shared mutable state.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use munition_common::{
    CallError, CompileError, InstantiateError, InvocationConfig, TrapKind,
};

use crate::caps::{self, CapabilitySet};
use crate::capture::{self, CaptureContext};
use crate::dump::{CrashCause, ForensicDump};
use crate::fuel::FuelPolicy;
use crate::hostfn::{HostFunctionBinding, HostFunctionTable};
use crate::runtime::{Interrupter, Runtime};
use crate::value::Value;

/// Per-invocation options. Unset fields default from configuration.
#[derive(Debug, Clone, Default)]
pub struct FireOptions {
    /// Fuel budget; defaults from the fuel policy.
    pub fuel: Option<u64>,
    /// Wall-clock timeout in milliseconds; defaults from configuration.
    pub timeout_ms: Option<u32>,
    /// Requested capability atoms; aliases allowed.
    pub capabilities: Vec<String>,
    /// Bound on dump memory in 64 KiB pages; defaults from configuration.
    pub max_memory_pages_in_dump: Option<u32>,
}

impl FireOptions {
    /// Set an explicit fuel budget.
    #[must_use]
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = Some(fuel);
        self
    }

    /// Set an explicit timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Request capabilities (atoms or aliases).
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Bound the memory captured into a dump.
    #[must_use]
    pub fn with_max_memory_pages_in_dump(mut self, pages: u32) -> Self {
        self.max_memory_pages_in_dump = Some(pages);
        self
    }
}

/// Execution metadata of a completed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationMetadata {
    /// Fuel consumed.
    pub fuel_consumed: u64,
    /// Fuel left of the budget.
    pub fuel_remaining: u64,
    /// Wall time of the whole invocation.
    pub wall_time_ns: u64,
}

/// The only two outcomes a caller can observe.
#[derive(Debug)]
pub enum InvocationResult {
    /// The call completed within fuel and timeout.
    Ok {
        /// The function's result values.
        values: Vec<Value>,
        /// Execution metadata.
        metadata: InvocationMetadata,
    },
    /// The invocation crashed; the dump is complete (possibly with
    /// degraded memory) and owned by the caller.
    Crash(Box<ForensicDump>),
}

impl InvocationResult {
    /// Returns `true` for a completed invocation.
    pub fn is_ok(&self) -> bool {
        matches!(self, InvocationResult::Ok { .. })
    }

    /// Returns `true` for a crashed invocation.
    pub fn is_crash(&self) -> bool {
        matches!(self, InvocationResult::Crash(_))
    }

    /// The dump, if this is a crash.
    pub fn dump(&self) -> Option<&ForensicDump> {
        match self {
            InvocationResult::Crash(dump) => Some(dump),
            InvocationResult::Ok { .. } => None,
        }
    }

    /// Consume into the dump, if this is a crash.
    pub fn into_dump(self) -> Option<Box<ForensicDump>> {
        match self {
            InvocationResult::Crash(dump) => Some(dump),
            InvocationResult::Ok { .. } => None,
        }
    }
}

/// Lifecycle phase, for tracing.
#[derive(Debug, Clone, Copy)]
enum Phase {
    Validating,
    Compiling,
    Linking,
    Instantiating,
    Running,
    Capturing,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Validating => "validating",
            Phase::Compiling => "compiling",
            Phase::Linking => "linking",
            Phase::Instantiating => "instantiating",
            Phase::Running => "running",
            Phase::Capturing => "capturing",
        }
    }
}

/// The orchestrator. Generic over the engine backend; safe to share and
/// call concurrently — every invocation owns its module, instance, and
/// store exclusively.
pub struct InstanceManager<R: Runtime> {
    runtime: Arc<R>,
    table: HostFunctionTable,
    fuel_policy: FuelPolicy,
    config: InvocationConfig,
}

impl<R: Runtime> InstanceManager<R> {
    /// Create a manager over an engine backend and a host function table.
    pub fn new(runtime: R, table: HostFunctionTable, config: InvocationConfig) -> Self {
        Self {
            runtime: Arc::new(runtime),
            table,
            fuel_policy: FuelPolicy::new(&config),
            config,
        }
    }

    /// The fuel policy, for callers that want scaled budgets.
    pub fn fuel_policy(&self) -> &FuelPolicy {
        &self.fuel_policy
    }

    /// Check that `wasm` compiles, without instantiating or running it.
    ///
    /// # Errors
    ///
    /// Returns the compile diagnostic for invalid modules.
    pub fn validate(&self, wasm: &[u8]) -> Result<(), CompileError> {
        self.runtime.compile(wasm).map(|_| ())
    }

    /// Execute one invocation under fuel, timeout, and capability
    /// attenuation.
    ///
    /// Never returns partial success: either `Ok` with complete metadata
    /// or `Crash` with a complete (possibly degraded-memory) dump.
    #[instrument(skip_all, fields(function = %function, wasm_len = wasm.len()))]
    pub async fn fire(
        &self,
        wasm: &[u8],
        function: &str,
        args: &[Value],
        options: FireOptions,
    ) -> InvocationResult {
        let started = Instant::now();
        let FireOptions {
            fuel,
            timeout_ms,
            capabilities: requested,
            max_memory_pages_in_dump,
        } = options;

        let initial_fuel = fuel.unwrap_or_else(|| self.fuel_policy.default_fuel());
        let timeout = timeout_ms
            .map(|ms| Duration::from_millis(u64::from(ms)))
            .unwrap_or_else(|| self.config.default_timeout());
        let max_memory_pages = max_memory_pages_in_dump.or(self.config.max_dump_memory_pages);

        debug!(phase = Phase::Validating.as_str(), requested = ?requested);
        let granted = match caps::validate(&requested) {
            Ok(validated) => caps::effective(&validated),
            Err(err) => {
                debug!(capability = %err.name, "unknown capability requested");
                let none = CapabilitySet::new();
                let ctx = invocation_ctx(
                    function, args, &requested, &none, initial_fuel, started, max_memory_pages,
                );
                // The reason is a fixed sentinel; the offending atom is
                // preserved verbatim in the dump's requested capabilities.
                return self.crashed(capture::capture_unborn(
                    CrashCause::InstantiationFailed {
                        reason: "unknown_capability".to_string(),
                    },
                    &ctx,
                    0,
                    None,
                ));
            }
        };

        let ctx = invocation_ctx(
            function, args, &requested, &granted, initial_fuel, started, max_memory_pages,
        );

        debug!(phase = Phase::Compiling.as_str());
        let module = match self.runtime.compile(wasm) {
            Ok(module) => module,
            Err(CompileError::InvalidModule { reason }) => {
                return self.crashed(capture::capture_unborn(
                    CrashCause::InvalidModule { reason },
                    &ctx,
                    0,
                    None,
                ));
            }
        };

        // The sole enforcement point for capability attenuation: a host
        // function is present in the import set iff its capability is in
        // the effective granted set. Denied imports are absent, so a
        // module that declares one fails at instantiation with a
        // deterministic missing-import error.
        let bindings: Vec<&'static HostFunctionBinding> = self
            .table
            .iter()
            .filter(|binding| granted.contains(binding.capability))
            .collect();
        debug!(
            phase = Phase::Linking.as_str(),
            granted = %granted,
            bound = bindings.len(),
            table = self.table.len(),
        );

        debug!(phase = Phase::Instantiating.as_str(), initial_fuel);
        let sandbox = match self.runtime.instantiate(&module, &bindings, initial_fuel) {
            Ok(sandbox) => sandbox,
            Err(failure) => {
                // When guest code ran (a start function trapped or burned
                // the budget), no store handle survives the failed
                // instantiation, so memory and globals cannot be read.
                // Record the skipped capture instead of silently emitting
                // a dump shaped like a link failure's.
                let note = match &failure.error {
                    InstantiateError::Trap(_) | InstantiateError::FuelExhausted => Some(
                        "store unreachable after instantiation failure; memory not captured"
                            .to_string(),
                    ),
                    InstantiateError::MissingImport { .. }
                    | InstantiateError::UnsupportedImport { .. } => None,
                };
                let cause = self.instantiate_cause(failure.error);
                return self.crashed(capture::capture_unborn(
                    cause,
                    &ctx,
                    failure.fuel_consumed,
                    note,
                ));
            }
        };

        debug!(phase = Phase::Running.as_str(), timeout_ms = timeout.as_millis() as u64);
        let (sandbox, outcome, timed_out) =
            match self.run_with_timeout(sandbox, function, args, timeout).await {
                Rendezvous::Joined {
                    sandbox,
                    outcome,
                    timed_out,
                } => (sandbox, outcome, timed_out),
                Rendezvous::Lost => {
                    warn!("worker did not yield after interrupt; emitting degraded timeout dump");
                    return self.crashed(capture::capture_unborn(
                        CrashCause::Timeout,
                        &ctx,
                        0,
                        Some("sandbox unrecoverable after interrupt; memory not captured".into()),
                    ));
                }
            };
        let mut sandbox = sandbox;

        match outcome {
            Ok((values, fuel_remaining)) if !timed_out => {
                let metadata = InvocationMetadata {
                    fuel_consumed: initial_fuel.saturating_sub(fuel_remaining),
                    fuel_remaining,
                    wall_time_ns: started.elapsed().as_nanos() as u64,
                };
                self.runtime.cleanup(sandbox);
                info!(
                    fuel_remaining = metadata.fuel_remaining,
                    wall_time_us = metadata.wall_time_ns / 1_000,
                    "invocation completed"
                );
                InvocationResult::Ok { values, metadata }
            }
            outcome => {
                let cause = if timed_out {
                    CrashCause::Timeout
                } else {
                    match outcome {
                        Err(CallError::FuelExhausted) => CrashCause::FuelExhausted,
                        Err(CallError::Trap(trap)) => CrashCause::Trap(trap),
                        Err(CallError::MissingExport { name }) => CrashCause::InstantiationFailed {
                            reason: format!("export `{name}` not found"),
                        },
                        Ok(_) => unreachable!("success without timeout is handled above"),
                    }
                };

                debug!(phase = Phase::Capturing.as_str(), cause = cause.label());
                let dump = capture::capture(self.runtime.as_ref(), &mut sandbox, cause, &ctx);
                self.runtime.cleanup(sandbox);
                self.crashed(dump)
            }
        }
    }

    /// Run the engine call on a blocking worker and rendezvous with it
    /// under the timeout. Panics from native host callbacks are caught
    /// around the call so the store survives for capture.
    async fn run_with_timeout(
        &self,
        mut sandbox: R::Sandbox,
        function: &str,
        args: &[Value],
        timeout: Duration,
    ) -> Rendezvous<R::Sandbox> {
        let interrupter = self.runtime.interrupter(&sandbox);
        let runtime = Arc::clone(&self.runtime);
        let function = function.to_string();
        let args = args.to_vec();

        let mut worker = tokio::task::spawn_blocking(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                runtime.call(&mut sandbox, &function, &args)
            }))
            .unwrap_or_else(|payload| {
                Err(CallError::trap(TrapKind::HostPanic, panic_message(&payload)))
            });
            (sandbox, outcome)
        });

        match tokio::time::timeout(timeout, &mut worker).await {
            Ok(joined) => {
                let (sandbox, outcome) = unwrap_join(joined);
                Rendezvous::Joined {
                    sandbox,
                    outcome,
                    timed_out: false,
                }
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "invocation exceeded timeout; interrupting engine"
                );
                interrupter.interrupt();

                match tokio::time::timeout(self.config.interrupt_grace(), &mut worker).await {
                    Ok(joined) => {
                        let (sandbox, outcome) = unwrap_join(joined);
                        Rendezvous::Joined {
                            sandbox,
                            outcome,
                            timed_out: true,
                        }
                    }
                    Err(_) => Rendezvous::Lost,
                }
            }
        }
    }

    fn instantiate_cause(&self, error: InstantiateError) -> CrashCause {
        match error {
            InstantiateError::MissingImport { namespace, name } => {
                match self.table.capability_for(&namespace, &name) {
                    // A gated import that was filtered out: report the
                    // capability, not a link error.
                    Some(capability) => CrashCause::HostDenied { capability },
                    None => CrashCause::InstantiationFailed {
                        reason: format!("unknown import `{namespace}::{name}`"),
                    },
                }
            }
            InstantiateError::UnsupportedImport { namespace, name } => {
                CrashCause::InstantiationFailed {
                    reason: format!("unsupported import signature for `{namespace}::{name}`"),
                }
            }
            InstantiateError::Trap(trap) => CrashCause::Trap(trap),
            InstantiateError::FuelExhausted => CrashCause::FuelExhausted,
        }
    }

    fn crashed(&self, dump: ForensicDump) -> InvocationResult {
        info!(
            cause = dump.cause.label(),
            fuel_consumed = dump.fuel_consumed,
            wall_time_us = dump.wall_time_ns / 1_000,
            "invocation crashed"
        );
        InvocationResult::Crash(Box::new(dump))
    }
}

impl<R: Runtime> std::fmt::Debug for InstanceManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceManager")
            .field("table_len", &self.table.len())
            .field("default_fuel", &self.fuel_policy.default_fuel())
            .finish_non_exhaustive()
    }
}

/// Result of the worker rendezvous.
enum Rendezvous<S> {
    /// The worker yielded the sandbox (normally or after interruption).
    Joined {
        sandbox: S,
        outcome: Result<(Vec<Value>, u64), CallError>,
        timed_out: bool,
    },
    /// The worker ignored interruption past the grace window.
    Lost,
}

fn invocation_ctx<'a>(
    function: &'a str,
    args: &'a [Value],
    requested: &'a [String],
    granted: &'a CapabilitySet,
    initial_fuel: u64,
    started: Instant,
    max_memory_pages: Option<u32>,
) -> CaptureContext<'a> {
    CaptureContext {
        function,
        args,
        requested_capabilities: requested,
        granted_capabilities: granted,
        initial_fuel,
        started,
        max_memory_pages,
    }
}

fn unwrap_join<T>(joined: Result<T, tokio::task::JoinError>) -> T {
    match joined {
        Ok(value) => value,
        // The worker catches host panics itself; reaching this means the
        // runtime implementation violated the contract. Propagate.
        Err(err) => match err.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            Err(err) => panic!("invocation worker failed: {err}"),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "host function panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_options_builder() {
        let options = FireOptions::default()
            .with_fuel(500)
            .with_timeout_ms(50)
            .with_capabilities(["time", "full_fs"])
            .with_max_memory_pages_in_dump(4);

        assert_eq!(options.fuel, Some(500));
        assert_eq!(options.timeout_ms, Some(50));
        assert_eq!(options.capabilities, vec!["time", "full_fs"]);
        assert_eq!(options.max_memory_pages_in_dump, Some(4));
    }

    #[test]
    fn test_invocation_result_accessors() {
        let ok = InvocationResult::Ok {
            values: vec![Value::I32(5)],
            metadata: InvocationMetadata {
                fuel_consumed: 10,
                fuel_remaining: 90,
                wall_time_ns: 1,
            },
        };
        assert!(ok.is_ok());
        assert!(!ok.is_crash());
        assert!(ok.dump().is_none());
        assert!(ok.into_dump().is_none());
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static panic");
        assert_eq!(panic_message(payload.as_ref()), "static panic");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned panic"));
        assert_eq!(panic_message(payload.as_ref()), "owned panic");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "host function panicked");
    }
}
