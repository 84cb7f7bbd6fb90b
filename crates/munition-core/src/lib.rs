//! Core of the munition capability-attenuation framework.
//!
//! Munition executes untrusted WebAssembly under three guarantees:
//! bounded execution (fuel + timeout), per-invocation isolation (fresh
//! instance and store per call, nothing shared), and forensic capture
//! (a post-mortem dump on every abnormal termination).
//!
//! This crate is engine-agnostic. It provides:
//! - [`caps`]: the capability registry (validation, alias expansion)
//! - [`hostfn`]: host function bindings and the [`hostfn::HostContext`] seam
//! - [`fuel`]: fuel allocation policy
//! - [`dump`]: the forensic dump record and its wire codec
//! - [`runtime`]: the [`runtime::Runtime`] contract an engine must satisfy
//! - [`capture`]: atomic forensic capture
//! - [`manager`]: the [`manager::InstanceManager`] orchestrator
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  InstanceManager<R>                     │
//! │  validate caps → compile → bind granted imports →       │
//! │  instantiate → call (worker + timeout) →                │
//! │  capture on failure → cleanup                           │
//! └─────────────────────────────────────────────────────────┘
//!            │ Runtime contract            │ on any failure
//!            ▼                             ▼
//! ┌──────────────────────┐      ┌──────────────────────────┐
//! │  engine backend      │      │  ForensicDump            │
//! │  (per-invocation     │      │  (cause, fuel, memory,   │
//! │   module + store)    │      │   globals; MDMP codec)   │
//! └──────────────────────┘      └──────────────────────────┘
//! ```

pub mod caps;
pub mod capture;
pub mod dump;
pub mod fuel;
pub mod hostfn;
pub mod manager;
pub mod runtime;
pub mod value;

pub use caps::{Capability, CapabilitySet};
pub use capture::{CaptureContext, WASM_PAGE_BYTES};
pub use dump::{CrashCause, DumpMemory, ForensicDump, MemoryCodec};
pub use fuel::FuelPolicy;
pub use hostfn::{
    GuestLogLevel, HostContext, HostFunctionBinding, HostFunctionTable, HostSignature, NativeFn,
};
pub use manager::{FireOptions, InstanceManager, InvocationMetadata, InvocationResult};
pub use runtime::{Interrupter, Runtime};
pub use value::{Value, ValueKind};
