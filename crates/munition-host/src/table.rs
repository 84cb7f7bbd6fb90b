//! The standard host function table.
//!
//! Process-wide and read-only: the manager filters these entries by the
//! effective capability set at link time.

use munition_core::{
    Capability, HostFunctionBinding, HostFunctionTable, HostSignature, ValueKind,
};

use crate::clock::clock_ns_native;
use crate::entropy::random_fill_native;
use crate::fs::{fs_read_native, fs_write_native};
use crate::logging::log_native;
use crate::net::net_probe_native;

/// The standard entries, namespace `env`.
pub static STANDARD_ENTRIES: [HostFunctionBinding; 6] = [
    HostFunctionBinding {
        namespace: "env",
        name: "log",
        capability: Capability::HostCall,
        signature: HostSignature {
            params: &[ValueKind::I32, ValueKind::I32, ValueKind::I32],
            results: &[],
        },
        native: log_native,
    },
    HostFunctionBinding {
        namespace: "env",
        name: "clock_ns",
        capability: Capability::Time,
        signature: HostSignature {
            params: &[],
            results: &[ValueKind::I64],
        },
        native: clock_ns_native,
    },
    HostFunctionBinding {
        namespace: "env",
        name: "random_fill",
        capability: Capability::Random,
        signature: HostSignature {
            params: &[ValueKind::I32, ValueKind::I32],
            results: &[],
        },
        native: random_fill_native,
    },
    HostFunctionBinding {
        namespace: "env",
        name: "fs_read",
        capability: Capability::FilesystemRead,
        signature: HostSignature {
            params: &[
                ValueKind::I32,
                ValueKind::I32,
                ValueKind::I32,
                ValueKind::I32,
            ],
            results: &[ValueKind::I32],
        },
        native: fs_read_native,
    },
    HostFunctionBinding {
        namespace: "env",
        name: "fs_write",
        capability: Capability::FilesystemWrite,
        signature: HostSignature {
            params: &[
                ValueKind::I32,
                ValueKind::I32,
                ValueKind::I32,
                ValueKind::I32,
            ],
            results: &[ValueKind::I32],
        },
        native: fs_write_native,
    },
    HostFunctionBinding {
        namespace: "env",
        name: "net_probe",
        capability: Capability::Network,
        signature: HostSignature {
            params: &[ValueKind::I32, ValueKind::I32, ValueKind::I32],
            results: &[ValueKind::I32],
        },
        native: net_probe_native,
    },
];

/// The standard table.
pub fn standard_table() -> HostFunctionTable {
    HostFunctionTable::new(&STANDARD_ENTRIES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_complete() {
        let table = standard_table();
        assert_eq!(table.len(), 6);

        for name in ["log", "clock_ns", "random_fill", "fs_read", "fs_write", "net_probe"] {
            assert!(table.lookup("env", name).is_some(), "missing env::{name}");
        }
    }

    #[test]
    fn test_capability_gating() {
        let table = standard_table();

        assert_eq!(table.capability_for("env", "log"), Some(Capability::HostCall));
        assert_eq!(table.capability_for("env", "clock_ns"), Some(Capability::Time));
        assert_eq!(
            table.capability_for("env", "random_fill"),
            Some(Capability::Random)
        );
        assert_eq!(
            table.capability_for("env", "fs_read"),
            Some(Capability::FilesystemRead)
        );
        assert_eq!(
            table.capability_for("env", "fs_write"),
            Some(Capability::FilesystemWrite)
        );
        assert_eq!(
            table.capability_for("env", "net_probe"),
            Some(Capability::Network)
        );
    }

    #[test]
    fn test_no_entry_uses_an_implicit_capability() {
        // Implicit capabilities gate nothing: an entry carrying one would
        // be importable by every module regardless of its request.
        for entry in standard_table().iter() {
            assert!(!matches!(
                entry.capability,
                Capability::Compute | Capability::MemoryRead | Capability::MemoryWrite
            ));
        }
    }
}
