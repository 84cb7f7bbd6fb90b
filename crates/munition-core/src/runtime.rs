//! The runtime contract: the operations an engine backend must provide.
//!
//! The instance manager is generic over this trait and holds no direct
//! reference to any particular engine. Every operation is synchronous
//! from the manager's point of view; the manager supplies the worker
//! thread and the timeout rendezvous.
//!
//! # Capture contract
//!
//! `read_memory`, `read_globals`, and `fuel_consumed` MUST remain valid
//! after a trapped `call` and before `cleanup`. Engines that cannot
//! provide this cannot serve as a munition runtime: it is the property
//! that makes forensic capture possible.

use munition_common::{CallError, CompileError, InstantiateFailure, MemoryError};

use crate::hostfn::HostFunctionBinding;
use crate::value::Value;

/// Handle for interrupting a running call from another thread.
///
/// The manager obtains one before handing the sandbox to the worker; when
/// the wall-clock timeout fires it calls [`Interrupter::interrupt`], and
/// the engine must abort the in-flight call promptly while leaving the
/// store observable for capture. Interrupting an idle sandbox is a no-op.
pub trait Interrupter: Send + 'static {
    /// Abort the in-flight call.
    fn interrupt(&self);
}

/// An engine backend.
///
/// Implementations must meter fuel (engines without fuel metering cannot
/// satisfy the contract) and must support some interruption side channel
/// for the timeout guarantee.
pub trait Runtime: Send + Sync + 'static {
    /// Compiled module artifact. Created per invocation, released in
    /// cleanup, never shared between invocations.
    type Module: Send;

    /// Instance plus its store (memory, globals, fuel). Exclusively owned
    /// by a single invocation.
    type Sandbox: Send + 'static;

    /// See [`Interrupter`].
    type Interrupter: Interrupter;

    /// Compile a module from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::InvalidModule`] for anything the engine
    /// rejects.
    fn compile(&self, wasm: &[u8]) -> Result<Self::Module, CompileError>;

    /// Instantiate with exactly the given import bindings and an initial
    /// fuel budget.
    ///
    /// Imports the module declares but the bindings do not provide must
    /// fail with a missing-import error (deterministically, before any
    /// guest code runs).
    ///
    /// # Errors
    ///
    /// The failure carries the fuel consumed before the store was
    /// released, so a start-function trap still yields fuel numbers.
    fn instantiate(
        &self,
        module: &Self::Module,
        imports: &[&'static HostFunctionBinding],
        initial_fuel: u64,
    ) -> Result<Self::Sandbox, InstantiateFailure>;

    /// Call an exported function.
    ///
    /// On success returns the result values and the remaining fuel.
    fn call(
        &self,
        sandbox: &mut Self::Sandbox,
        function: &str,
        args: &[Value],
    ) -> Result<(Vec<Value>, u64), CallError>;

    /// Read a range of linear memory. Valid after a trap, before cleanup.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when the range exceeds memory.
    fn read_memory(
        &self,
        sandbox: &mut Self::Sandbox,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>, MemoryError>;

    /// Current linear memory size in bytes (0 when the module exports no
    /// memory).
    fn memory_size(&self, sandbox: &mut Self::Sandbox) -> u64;

    /// The module's exported globals in export order. Valid after a trap,
    /// before cleanup.
    fn read_globals(&self, sandbox: &mut Self::Sandbox) -> Vec<Value>;

    /// Fuel consumed so far.
    fn fuel_consumed(&self, sandbox: &mut Self::Sandbox) -> u64;

    /// Obtain an interrupt handle for this sandbox.
    fn interrupter(&self, sandbox: &Self::Sandbox) -> Self::Interrupter;

    /// Release all engine resources of this invocation. Infallible.
    fn cleanup(&self, sandbox: Self::Sandbox);
}
