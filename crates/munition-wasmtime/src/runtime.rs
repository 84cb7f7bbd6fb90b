//! The default munition runtime, backed by Wasmtime.
//!
//! Every invocation gets its own `Engine`, `Module`, and `Store`:
//! modules are never shared between invocations, and keeping the engine
//! invocation-local makes epoch-bump interruption affect exactly one
//! invocation.
//!
//! Fuel metering is always on. Epoch interruption (on by default) is the
//! timeout side channel: the store's epoch deadline is preset to one tick
//! at instantiation and nothing ever advances the epoch except
//! [`EpochInterrupter::interrupt`], so a single bump aborts the in-flight
//! call while leaving the store observable for capture.

use std::sync::Arc;

use tracing::debug;
use wasmtime::{
    Config, Engine, ExternType, Global, Instance, Linker, Memory, Module, OptLevel, Store, Trap,
    Val,
};

use munition_common::{
    CallError, CompileError, EngineConfig, HostConfig, InstantiateError, InstantiateFailure,
    MemoryError, RuntimeConfig, TrapError, TrapKind,
};
use munition_core::{HostFunctionBinding, Interrupter, Runtime, Value};

use crate::binder::{self, val_to_value, value_to_val, valtype_to_kind, HostCallFailed};
use crate::context::SandboxContext;

/// Wasmtime-backed implementation of the runtime contract.
pub struct WasmtimeRuntime {
    engine_config: EngineConfig,
    host_config: Arc<HostConfig>,
}

/// A compiled module together with the engine that owns it.
pub struct WasmtimeModule {
    pub(crate) engine: Engine,
    pub(crate) module: Module,
}

/// Instance, store, and the handles capture needs after a trap.
pub struct WasmtimeSandbox {
    pub(crate) store: Store<SandboxContext>,
    pub(crate) instance: Instance,
    pub(crate) memory: Option<Memory>,
    pub(crate) globals: Vec<Global>,
    pub(crate) engine: Engine,
}

impl WasmtimeSandbox {
    /// The invocation context (guest logs live here).
    pub fn context(&self) -> &SandboxContext {
        self.store.data()
    }
}

impl std::fmt::Debug for WasmtimeSandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmtimeSandbox").finish_non_exhaustive()
    }
}

/// Interrupts a call by advancing the engine epoch past the store's
/// preset deadline. A no-op when epoch interruption is disabled.
pub struct EpochInterrupter {
    engine: Engine,
    enabled: bool,
}

impl Interrupter for EpochInterrupter {
    fn interrupt(&self) {
        if self.enabled {
            self.engine.increment_epoch();
        }
    }
}

impl WasmtimeRuntime {
    /// Create a runtime from configuration.
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            engine_config: config.engine.clone(),
            host_config: Arc::new(config.host.clone()),
        }
    }

    fn build_engine(&self) -> Result<Engine, CompileError> {
        let mut config = Config::new();
        config.consume_fuel(true);
        config.epoch_interruption(self.engine_config.epoch_interruption);
        config.wasm_backtrace(self.engine_config.wasm_backtrace);
        config.cranelift_opt_level(OptLevel::Speed);

        // Our settings are fixed and valid; a failure here means the
        // host build cannot run Wasmtime at all.
        Engine::new(&config)
            .map_err(|err| CompileError::invalid_module(format!("engine init failed: {err}")))
    }

    /// Validate the WebAssembly header before handing bytes to the engine.
    fn validate_wasm_header(bytes: &[u8]) -> Result<(), CompileError> {
        if bytes.len() < 8 {
            return Err(CompileError::invalid_module("file too small"));
        }
        if &bytes[0..4] != b"\0asm" {
            return Err(CompileError::invalid_module("bad magic number"));
        }
        Ok(())
    }

    fn map_call_error(store: &mut Store<SandboxContext>, err: wasmtime::Error) -> CallError {
        if let Some(failed) = err.downcast_ref::<HostCallFailed>() {
            return CallError::trap(TrapKind::HostError, failed.0.to_string());
        }

        match err.downcast_ref::<Trap>() {
            Some(Trap::OutOfFuel) => {
                // The budget is spent; zero the residue so dumps report
                // exactly zero remaining.
                let _ = store.set_fuel(0);
                CallError::FuelExhausted
            }
            Some(trap) => CallError::Trap(TrapError::new(classify_trap(*trap), err.to_string())),
            None => CallError::trap(TrapKind::Unknown, err.to_string()),
        }
    }
}

impl Runtime for WasmtimeRuntime {
    type Module = WasmtimeModule;
    type Sandbox = WasmtimeSandbox;
    type Interrupter = EpochInterrupter;

    fn compile(&self, wasm: &[u8]) -> Result<Self::Module, CompileError> {
        Self::validate_wasm_header(wasm)?;

        let engine = self.build_engine()?;
        let module = Module::new(&engine, wasm)
            .map_err(|err| CompileError::invalid_module(err.to_string()))?;

        debug!(wasm_len = wasm.len(), "module compiled");
        Ok(WasmtimeModule { engine, module })
    }

    fn instantiate(
        &self,
        module: &Self::Module,
        imports: &[&'static HostFunctionBinding],
        initial_fuel: u64,
    ) -> Result<Self::Sandbox, InstantiateFailure> {
        // Structural link check: every declared import must be provided,
        // as a function, with a marshallable matching signature. This is
        // what makes a denied capability a deterministic failure before
        // any guest code runs.
        for import in module.module.imports() {
            let namespace = import.module();
            let name = import.name();

            let Some(binding) = imports
                .iter()
                .copied()
                .find(|b| b.namespace == namespace && b.name == name)
            else {
                return Err(InstantiateFailure::new(InstantiateError::MissingImport {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                }));
            };

            let ExternType::Func(func_ty) = import.ty() else {
                return Err(unsupported(namespace, name));
            };
            if !signature_matches(&func_ty, binding) {
                return Err(unsupported(namespace, name));
            }
        }

        let context = SandboxContext::new(Arc::clone(&self.host_config), initial_fuel);
        let mut store = Store::new(&module.engine, context);
        store.set_fuel(initial_fuel).map_err(|err| {
            InstantiateFailure::new(InstantiateError::Trap(TrapError::new(
                TrapKind::Unknown,
                format!("failed to set fuel: {err}"),
            )))
        })?;

        if self.engine_config.epoch_interruption {
            // One tick from "now"; only an explicit interrupt advances
            // the epoch, so this never fires on its own.
            store.set_epoch_deadline(1);
        }

        let mut linker: Linker<SandboxContext> = Linker::new(&module.engine);
        for &binding in imports {
            binder::register(&mut linker, &module.engine, binding)?;
        }

        match linker.instantiate(&mut store, &module.module) {
            Ok(instance) => {
                let memory = instance.get_memory(&mut store, "memory");
                let globals = exported_globals(&module.module, &instance, &mut store);

                debug!(
                    initial_fuel,
                    has_memory = memory.is_some(),
                    globals = globals.len(),
                    "module instantiated"
                );

                Ok(WasmtimeSandbox {
                    store,
                    instance,
                    memory,
                    globals,
                    engine: module.engine.clone(),
                })
            }
            Err(err) => {
                // A start function may have burned fuel before failing.
                let fuel_consumed = initial_fuel.saturating_sub(store.get_fuel().unwrap_or(0));
                let error = if let Some(failed) = err.downcast_ref::<HostCallFailed>() {
                    InstantiateError::Trap(TrapError::new(
                        TrapKind::HostError,
                        failed.0.to_string(),
                    ))
                } else {
                    match err.downcast_ref::<Trap>() {
                        Some(Trap::OutOfFuel) => InstantiateError::FuelExhausted,
                        Some(trap) => InstantiateError::Trap(TrapError::new(
                            classify_trap(*trap),
                            err.to_string(),
                        )),
                        None => InstantiateError::Trap(TrapError::new(
                            TrapKind::Unknown,
                            err.to_string(),
                        )),
                    }
                };
                Err(InstantiateFailure {
                    error,
                    fuel_consumed,
                })
            }
        }
    }

    fn call(
        &self,
        sandbox: &mut Self::Sandbox,
        function: &str,
        args: &[Value],
    ) -> Result<(Vec<Value>, u64), CallError> {
        let Some(func) = sandbox.instance.get_func(&mut sandbox.store, function) else {
            return Err(CallError::MissingExport {
                name: function.to_string(),
            });
        };

        let params: Vec<Val> = args.iter().map(value_to_val).collect();
        let result_count = func.ty(&sandbox.store).results().len();
        let mut results = vec![Val::I32(0); result_count];

        match func.call(&mut sandbox.store, &params, &mut results) {
            Ok(()) => {
                let mut values = Vec::with_capacity(results.len());
                for result in &results {
                    let value = val_to_value(result).ok_or_else(|| {
                        CallError::trap(TrapKind::Unknown, "unsupported result type")
                    })?;
                    values.push(value);
                }
                let fuel_remaining = sandbox.store.get_fuel().unwrap_or(0);
                Ok((values, fuel_remaining))
            }
            Err(err) => Err(Self::map_call_error(&mut sandbox.store, err)),
        }
    }

    fn read_memory(
        &self,
        sandbox: &mut Self::Sandbox,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>, MemoryError> {
        let size = self.memory_size(sandbox);
        let Some(memory) = sandbox.memory else {
            return Err(MemoryError::OutOfBounds { offset, len, size });
        };

        let end = offset.checked_add(len).filter(|&end| end <= size);
        let Some(end) = end else {
            return Err(MemoryError::OutOfBounds { offset, len, size });
        };

        let data = memory.data(&sandbox.store);
        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn memory_size(&self, sandbox: &mut Self::Sandbox) -> u64 {
        sandbox
            .memory
            .map_or(0, |memory| memory.data_size(&sandbox.store) as u64)
    }

    fn read_globals(&self, sandbox: &mut Self::Sandbox) -> Vec<Value> {
        let globals = sandbox.globals.clone();
        globals
            .iter()
            .filter_map(|global| val_to_value(&global.get(&mut sandbox.store)))
            .collect()
    }

    fn fuel_consumed(&self, sandbox: &mut Self::Sandbox) -> u64 {
        let remaining = sandbox.store.get_fuel().unwrap_or(0);
        sandbox.store.data().initial_fuel.saturating_sub(remaining)
    }

    fn interrupter(&self, sandbox: &Self::Sandbox) -> Self::Interrupter {
        EpochInterrupter {
            engine: sandbox.engine.clone(),
            enabled: self.engine_config.epoch_interruption,
        }
    }

    fn cleanup(&self, sandbox: Self::Sandbox) {
        // All engine resources of the invocation (instance, store,
        // memories, the engine itself) are released here.
        drop(sandbox);
        debug!("sandbox released");
    }
}

impl std::fmt::Debug for WasmtimeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmtimeRuntime")
            .field("epoch_interruption", &self.engine_config.epoch_interruption)
            .finish_non_exhaustive()
    }
}

fn unsupported(namespace: &str, name: &str) -> InstantiateFailure {
    InstantiateFailure::new(InstantiateError::UnsupportedImport {
        namespace: namespace.to_string(),
        name: name.to_string(),
    })
}

fn signature_matches(func_ty: &wasmtime::FuncType, binding: &HostFunctionBinding) -> bool {
    let params: Vec<_> = func_ty.params().collect();
    let results: Vec<_> = func_ty.results().collect();

    if params.len() != binding.signature.params.len()
        || results.len() != binding.signature.results.len()
    {
        return false;
    }

    params
        .iter()
        .zip(binding.signature.params)
        .all(|(ty, kind)| valtype_to_kind(ty) == Some(*kind))
        && results
            .iter()
            .zip(binding.signature.results)
            .all(|(ty, kind)| valtype_to_kind(ty) == Some(*kind))
}

/// Exported globals in export order.
fn exported_globals(
    module: &Module,
    instance: &Instance,
    store: &mut Store<SandboxContext>,
) -> Vec<Global> {
    let names: Vec<String> = module
        .exports()
        .filter(|export| matches!(export.ty(), ExternType::Global(_)))
        .map(|export| export.name().to_string())
        .collect();

    names
        .iter()
        .filter_map(|name| instance.get_global(&mut *store, name))
        .collect()
}

fn classify_trap(trap: Trap) -> TrapKind {
    match trap {
        Trap::UnreachableCodeReached => TrapKind::Unreachable,
        Trap::IntegerDivisionByZero => TrapKind::IntegerDivideByZero,
        Trap::IntegerOverflow | Trap::BadConversionToInteger => TrapKind::IntegerOverflow,
        Trap::MemoryOutOfBounds => TrapKind::OutOfBoundsMemoryAccess,
        Trap::BadSignature => TrapKind::IndirectCallTypeMismatch,
        Trap::StackOverflow => TrapKind::StackOverflow,
        Trap::IndirectCallToNull | Trap::TableOutOfBounds => TrapKind::UndefinedElement,
        _ => TrapKind::Unknown,
    }
}
