//! Error types for munition.
//!
//! This module defines the typed errors that flow between components:
//! - [`CompileError`], [`InstantiateError`], [`CallError`], [`MemoryError`]:
//!   runtime-contract errors produced by an engine backend
//! - [`TrapError`] / [`TrapKind`]: classified engine traps
//! - [`HostError`]: errors from host function implementations
//! - [`DumpFormatError`] / [`DumpEncodeError`]: forensic dump codec errors
//!
//! The instance manager translates contract errors into a dump cause exactly
//! once, at the capture site; nothing in here reaches the public API surface
//! except through a dump.

use std::io;

use thiserror::Error;

/// Trap classifications recognized by the framework.
///
/// Engine backends map their native trap representation onto this taxonomy;
/// anything without a counterpart becomes [`TrapKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    /// The `unreachable` instruction was executed.
    Unreachable,
    /// Integer division by zero.
    IntegerDivideByZero,
    /// Integer overflow (e.g. `i32.trunc_f64_s` out of range).
    IntegerOverflow,
    /// Out-of-bounds linear memory access.
    OutOfBoundsMemoryAccess,
    /// `call_indirect` signature mismatch.
    IndirectCallTypeMismatch,
    /// Call stack exhausted.
    StackOverflow,
    /// `call_indirect` through a null or uninitialized table element.
    UndefinedElement,
    /// A host function returned an error.
    HostError,
    /// A host function panicked; the panic was caught at the call boundary.
    HostPanic,
    /// Unclassified trap.
    Unknown,
}

impl TrapKind {
    /// Stable lowercase name, used in dump encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            TrapKind::Unreachable => "unreachable",
            TrapKind::IntegerDivideByZero => "integer_divide_by_zero",
            TrapKind::IntegerOverflow => "integer_overflow",
            TrapKind::OutOfBoundsMemoryAccess => "out_of_bounds_memory_access",
            TrapKind::IndirectCallTypeMismatch => "indirect_call_type_mismatch",
            TrapKind::StackOverflow => "stack_overflow",
            TrapKind::UndefinedElement => "undefined_element",
            TrapKind::HostError => "host_error",
            TrapKind::HostPanic => "host_panic",
            TrapKind::Unknown => "unknown",
        }
    }

    /// Inverse of [`TrapKind::as_str`]; unrecognized names decode as
    /// [`TrapKind::Unknown`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "unreachable" => TrapKind::Unreachable,
            "integer_divide_by_zero" => TrapKind::IntegerDivideByZero,
            "integer_overflow" => TrapKind::IntegerOverflow,
            "out_of_bounds_memory_access" => TrapKind::OutOfBoundsMemoryAccess,
            "indirect_call_type_mismatch" => TrapKind::IndirectCallTypeMismatch,
            "stack_overflow" => TrapKind::StackOverflow,
            "undefined_element" => TrapKind::UndefinedElement,
            "host_error" => TrapKind::HostError,
            "host_panic" => TrapKind::HostPanic,
            _ => TrapKind::Unknown,
        }
    }
}

impl std::fmt::Display for TrapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified engine trap with its original message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("wasm trap ({kind}): {message}")]
pub struct TrapError {
    /// Classification of the trap.
    pub kind: TrapKind,
    /// Engine-provided description.
    pub message: String,
}

impl TrapError {
    /// Create a new trap error.
    pub fn new(kind: TrapKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Compilation failures.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The bytes are not a valid WebAssembly module.
    #[error("invalid module: {reason}")]
    InvalidModule {
        /// Description of why the module was rejected.
        reason: String,
    },
}

impl CompileError {
    /// Create a new `InvalidModule` error.
    pub fn invalid_module(reason: impl Into<String>) -> Self {
        Self::InvalidModule {
            reason: reason.into(),
        }
    }

    /// The rejection reason.
    pub fn reason(&self) -> &str {
        match self {
            Self::InvalidModule { reason } => reason,
        }
    }
}

/// Instantiation failures.
#[derive(Error, Debug)]
pub enum InstantiateError {
    /// The module imports something that was not provided.
    ///
    /// With capability-gated import binding this is the deterministic
    /// failure mode for a denied capability.
    #[error("missing import `{namespace}::{name}`")]
    MissingImport {
        /// Import module namespace (e.g. `env`).
        namespace: String,
        /// Import field name.
        name: String,
    },

    /// The module imports something with a signature the value model
    /// cannot marshal (e.g. reference types).
    #[error("unsupported import signature for `{namespace}::{name}`")]
    UnsupportedImport {
        /// Import module namespace.
        namespace: String,
        /// Import field name.
        name: String,
    },

    /// The start function trapped.
    #[error("instantiation trapped: {0}")]
    Trap(TrapError),

    /// The start function exhausted the fuel budget.
    #[error("fuel exhausted during instantiation")]
    FuelExhausted,
}

/// An instantiation failure paired with the fuel observed before the
/// failed store was released. Lets a dump report fuel numbers even though
/// no instance survived to capture memory from.
#[derive(Debug)]
pub struct InstantiateFailure {
    /// What went wrong.
    pub error: InstantiateError,
    /// Fuel consumed before the failure (0 unless a start function ran).
    pub fuel_consumed: u64,
}

impl InstantiateFailure {
    /// Failure with no fuel consumed.
    pub fn new(error: InstantiateError) -> Self {
        Self {
            error,
            fuel_consumed: 0,
        }
    }
}

/// Call failures.
#[derive(Error, Debug)]
pub enum CallError {
    /// The fuel budget was exhausted.
    #[error("fuel exhausted")]
    FuelExhausted,

    /// Execution trapped.
    #[error("{0}")]
    Trap(TrapError),

    /// The requested export does not exist or is not a function.
    #[error("export `{name}` not found")]
    MissingExport {
        /// The requested export name.
        name: String,
    },
}

impl CallError {
    /// Create a trap error.
    pub fn trap(kind: TrapKind, message: impl Into<String>) -> Self {
        Self::Trap(TrapError::new(kind, message))
    }

    /// Returns `true` if the call failed due to fuel exhaustion.
    pub fn is_fuel_exhausted(&self) -> bool {
        matches!(self, Self::FuelExhausted)
    }
}

/// Linear memory read failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MemoryError {
    /// The requested range lies outside linear memory.
    #[error("out-of-bounds memory read: offset {offset} + len {len} exceeds {size} bytes")]
    OutOfBounds {
        /// Requested start offset.
        offset: u64,
        /// Requested length.
        len: u64,
        /// Actual memory size in bytes.
        size: u64,
    },
}

/// Errors from host function implementations.
///
/// Returning one of these from a native callback traps the guest with
/// `trap { kind: host_error }`. Capability checks never appear here; they
/// are resolved at link time.
#[derive(Error, Debug)]
pub enum HostError {
    /// Invalid argument was passed to a host function.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Description of why the argument was invalid.
        reason: String,
    },

    /// Guest memory could not be read or written.
    #[error("guest memory access failed: {reason}")]
    GuestMemory {
        /// Description of the access failure.
        reason: String,
    },

    /// A guest-supplied path tried to leave the sandbox root.
    #[error("path escapes sandbox root: {path}")]
    PathEscape {
        /// The offending path as the guest supplied it.
        path: String,
    },

    /// A filesystem operation failed.
    #[error("filesystem {op} failed: {source}")]
    Filesystem {
        /// The operation that failed.
        op: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl HostError {
    /// Create a new `InvalidArgument` error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a new `GuestMemory` error.
    pub fn guest_memory(reason: impl Into<String>) -> Self {
        Self::GuestMemory {
            reason: reason.into(),
        }
    }
}

/// A capability atom (or alias) outside the closed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown capability `{name}`")]
pub struct UnknownCapability {
    /// The unrecognized atom as requested.
    pub name: String,
}

/// Forensic dump decoding failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DumpFormatError {
    /// Input shorter than the fixed header + trailer.
    #[error("dump truncated: {len} bytes")]
    Truncated {
        /// Length of the rejected input.
        len: usize,
    },

    /// The magic bytes are not `MDMP`.
    #[error("bad dump magic")]
    BadMagic,

    /// Version tag this decoder does not understand.
    #[error("unsupported dump version {version}")]
    UnsupportedVersion {
        /// The version found in the header.
        version: u16,
    },

    /// Memory codec tag this decoder does not understand.
    #[error("unknown memory codec {codec}")]
    UnknownCodec {
        /// The codec byte found in the header.
        codec: u8,
    },

    /// CRC-32 trailer does not match the preceding bytes.
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// CRC stored in the trailer.
        stored: u32,
        /// CRC computed over the input.
        computed: u32,
    },

    /// A field payload could not be parsed.
    #[error("malformed {what}")]
    Malformed {
        /// Which field was malformed.
        what: &'static str,
    },

    /// Cause tag this decoder does not understand.
    #[error("unknown cause tag {tag}")]
    UnknownCause {
        /// The cause tag byte.
        tag: u8,
    },

    /// A required field was absent.
    #[error("missing {what}")]
    MissingField {
        /// Which field was missing.
        what: &'static str,
    },
}

/// Forensic dump encoding failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DumpEncodeError {
    /// A field exceeds what its length prefix can express.
    #[error("field `{field}` too large to encode: {len} bytes")]
    Oversize {
        /// The offending field.
        field: &'static str,
        /// Its payload size.
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trap_kind_name_round_trip() {
        for kind in [
            TrapKind::Unreachable,
            TrapKind::IntegerDivideByZero,
            TrapKind::IntegerOverflow,
            TrapKind::OutOfBoundsMemoryAccess,
            TrapKind::IndirectCallTypeMismatch,
            TrapKind::StackOverflow,
            TrapKind::UndefinedElement,
            TrapKind::HostError,
            TrapKind::HostPanic,
            TrapKind::Unknown,
        ] {
            assert_eq!(TrapKind::from_name(kind.as_str()), kind);
        }
        assert_eq!(TrapKind::from_name("no_such_trap"), TrapKind::Unknown);
    }

    #[test]
    fn test_error_display() {
        let err = CompileError::invalid_module("bad magic");
        assert_eq!(err.to_string(), "invalid module: bad magic");

        let err = CallError::FuelExhausted;
        assert_eq!(err.to_string(), "fuel exhausted");

        let err = CallError::trap(TrapKind::Unreachable, "boom");
        assert_eq!(err.to_string(), "wasm trap (unreachable): boom");
    }

    #[test]
    fn test_is_fuel_exhausted() {
        assert!(CallError::FuelExhausted.is_fuel_exhausted());
        assert!(!CallError::trap(TrapKind::Unknown, "x").is_fuel_exhausted());
    }

    #[test]
    fn test_unknown_capability_display() {
        let err = UnknownCapability {
            name: "teleport".into(),
        };
        assert_eq!(err.to_string(), "unknown capability `teleport`");
    }

    #[test]
    fn test_instantiate_failure_fuel_default() {
        let failure = InstantiateFailure::new(InstantiateError::MissingImport {
            namespace: "env".into(),
            name: "fs_read".into(),
        });
        assert_eq!(failure.fuel_consumed, 0);
        assert_eq!(
            failure.error.to_string(),
            "missing import `env::fs_read`"
        );
    }
}
