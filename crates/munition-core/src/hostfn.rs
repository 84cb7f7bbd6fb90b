//! Host function bindings and the engine-neutral host context seam.
//!
//! A [`HostFunctionBinding`] ties an import name to the capability that
//! gates it and to its native implementation. The table is assembled once
//! at process start and read-only afterwards; the manager includes an
//! entry in the import set only when its capability was granted, which is
//! the sole enforcement point — native implementations never re-check
//! capabilities.

use munition_common::{HostConfig, HostError};

use crate::caps::Capability;
use crate::value::{Value, ValueKind};

/// Native host function implementation.
///
/// Arguments arrive already marshalled into [`Value`]s; the returned
/// values must match the binding's declared result types. Returning an
/// error traps the guest.
pub type NativeFn = fn(&mut dyn HostContext, &[Value]) -> Result<Vec<Value>, HostError>;

/// Parameter and result types of a host import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostSignature {
    /// Parameter types, in order.
    pub params: &'static [ValueKind],
    /// Result types, in order.
    pub results: &'static [ValueKind],
}

/// One entry of the host function table.
pub struct HostFunctionBinding {
    /// Import module namespace (e.g. `env`).
    pub namespace: &'static str,
    /// Import field name.
    pub name: &'static str,
    /// The capability that gates this import.
    pub capability: Capability,
    /// Wasm-level signature.
    pub signature: HostSignature,
    /// Native implementation.
    pub native: NativeFn,
}

impl std::fmt::Debug for HostFunctionBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFunctionBinding")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// The process-wide host function table: static and read-only after init.
#[derive(Debug, Clone, Copy)]
pub struct HostFunctionTable {
    entries: &'static [HostFunctionBinding],
}

impl HostFunctionTable {
    /// Build a table over a static entry slice.
    pub const fn new(entries: &'static [HostFunctionBinding]) -> Self {
        Self { entries }
    }

    /// A table with no entries (modules without imports only).
    pub const fn empty() -> Self {
        Self { entries: &[] }
    }

    /// Iterate all entries.
    pub fn iter(&self) -> impl Iterator<Item = &'static HostFunctionBinding> {
        self.entries.iter()
    }

    /// Look up an entry by import key.
    pub fn lookup(&self, namespace: &str, name: &str) -> Option<&'static HostFunctionBinding> {
        self.entries
            .iter()
            .find(|b| b.namespace == namespace && b.name == name)
    }

    /// The capability gating an import, if the import exists at all.
    pub fn capability_for(&self, namespace: &str, name: &str) -> Option<Capability> {
        self.lookup(namespace, name).map(|b| b.capability)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Log level for guest-emitted logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestLogLevel {
    /// Debug-level messages.
    Debug,
    /// Informational messages.
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl GuestLogLevel {
    /// Convert a numeric log level received from the guest.
    ///
    /// `0=debug, 1=info, 2=warn, 3=error`; unknown values default to Info.
    pub fn from_i32(level: i32) -> Self {
        match level {
            0 => GuestLogLevel::Debug,
            2 => GuestLogLevel::Warn,
            3 => GuestLogLevel::Error,
            _ => GuestLogLevel::Info,
        }
    }
}

impl std::fmt::Display for GuestLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuestLogLevel::Debug => write!(f, "DEBUG"),
            GuestLogLevel::Info => write!(f, "INFO"),
            GuestLogLevel::Warn => write!(f, "WARN"),
            GuestLogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// What a native host function can do, abstracted from the engine.
///
/// The engine backend implements this over its caller handle; host
/// implementations are written against this trait only, which keeps the
/// host function table engine-agnostic.
pub trait HostContext {
    /// Read `len` bytes of guest linear memory at `offset`.
    fn read_guest(&mut self, offset: u32, len: u32) -> Result<Vec<u8>, HostError>;

    /// Write `data` into guest linear memory at `offset`.
    fn write_guest(&mut self, offset: u32, data: &[u8]) -> Result<(), HostError>;

    /// Record a guest log message.
    fn guest_log(&mut self, level: GuestLogLevel, message: &str);

    /// The host environment configuration.
    fn host_config(&self) -> &HostConfig;
}
