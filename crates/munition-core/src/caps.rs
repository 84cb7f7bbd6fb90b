//! The capability registry: the closed capability set, alias expansion,
//! and validation.
//!
//! Capabilities gate host imports at link time. Validation is the only
//! place aliases exist; everything downstream of [`validate`] works with
//! expanded atoms.

use std::collections::BTreeSet;
use std::fmt;

use munition_common::UnknownCapability;

/// A capability atom from the closed set.
///
/// `compute`, `memory_read`, and `memory_write` are implicit: every
/// invocation holds them without requesting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    /// Execute instructions.
    Compute,
    /// Read own linear memory.
    MemoryRead,
    /// Write own linear memory.
    MemoryWrite,
    /// Call generic host functions (logging).
    HostCall,
    /// Read files under the sandbox root.
    FilesystemRead,
    /// Write files under the sandbox root.
    FilesystemWrite,
    /// Reach the network.
    Network,
    /// Read the wall clock.
    Time,
    /// Obtain host randomness.
    Random,
}

impl Capability {
    /// All atoms, in canonical order.
    pub const ALL: [Capability; 9] = [
        Capability::Compute,
        Capability::MemoryRead,
        Capability::MemoryWrite,
        Capability::HostCall,
        Capability::FilesystemRead,
        Capability::FilesystemWrite,
        Capability::Network,
        Capability::Time,
        Capability::Random,
    ];

    /// Stable atom name.
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Compute => "compute",
            Capability::MemoryRead => "memory_read",
            Capability::MemoryWrite => "memory_write",
            Capability::HostCall => "host_call",
            Capability::FilesystemRead => "filesystem_read",
            Capability::FilesystemWrite => "filesystem_write",
            Capability::Network => "network",
            Capability::Time => "time",
            Capability::Random => "random",
        }
    }

    /// Parse a single atom. Aliases are not atoms; see [`validate`].
    pub fn parse_atom(name: &str) -> Option<Self> {
        Capability::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unordered set of capabilities.
///
/// Backed by a `BTreeSet` so iteration order (and therefore dump
/// encoding) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// The empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a capability.
    pub fn insert(&mut self, cap: Capability) {
        self.0.insert(cap);
    }

    /// Whether the set contains `cap`.
    pub fn contains(&self, cap: Capability) -> bool {
        self.0.contains(&cap)
    }

    /// Iterate in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    /// Number of capabilities in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The union of two sets.
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).copied().collect())
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for cap in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(cap.as_str())?;
            first = false;
        }
        Ok(())
    }
}

/// Validate a requested capability list: expand aliases, reject unknown
/// atoms. Pure and deterministic.
///
/// # Errors
///
/// Returns [`UnknownCapability`] naming the first unrecognized entry.
pub fn validate<I>(requested: I) -> Result<CapabilitySet, UnknownCapability>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut set = CapabilitySet::new();

    for entry in requested {
        let name = entry.as_ref();

        if let Some(cap) = Capability::parse_atom(name) {
            set.insert(cap);
            continue;
        }

        match name {
            "time_readonly" => set.insert(Capability::Time),
            "full_fs" => {
                set.insert(Capability::FilesystemRead);
                set.insert(Capability::FilesystemWrite);
            }
            _ => {
                return Err(UnknownCapability {
                    name: name.to_string(),
                })
            }
        }
    }

    Ok(set)
}

/// The always-granted set.
pub fn implicit() -> CapabilitySet {
    [
        Capability::Compute,
        Capability::MemoryRead,
        Capability::MemoryWrite,
    ]
    .into_iter()
    .collect()
}

/// The effective grant for a validated request: implicit ∪ requested.
pub fn effective(validated: &CapabilitySet) -> CapabilitySet {
    implicit().union(validated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_name_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(Capability::parse_atom(cap.as_str()), Some(cap));
        }
        assert_eq!(Capability::parse_atom("teleport"), None);
    }

    #[test]
    fn test_validate_atoms() {
        let set = validate(["time", "network"]).unwrap();
        assert!(set.contains(Capability::Time));
        assert!(set.contains(Capability::Network));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_validate_expands_aliases() {
        let set = validate(["time_readonly"]).unwrap();
        assert!(set.contains(Capability::Time));
        assert_eq!(set.len(), 1);

        let set = validate(["full_fs"]).unwrap();
        assert!(set.contains(Capability::FilesystemRead));
        assert!(set.contains(Capability::FilesystemWrite));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_validate_rejects_unknown() {
        let err = validate(["time", "teleport"]).unwrap_err();
        assert_eq!(err.name, "teleport");
    }

    #[test]
    fn test_validate_empty() {
        let set = validate(Vec::<String>::new()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_implicit() {
        let set = implicit();
        assert!(set.contains(Capability::Compute));
        assert!(set.contains(Capability::MemoryRead));
        assert!(set.contains(Capability::MemoryWrite));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_effective_unions_implicit() {
        let requested = validate(["filesystem_read"]).unwrap();
        let eff = effective(&requested);

        assert!(eff.contains(Capability::Compute));
        assert!(eff.contains(Capability::FilesystemRead));
        assert!(!eff.contains(Capability::FilesystemWrite));
        assert_eq!(eff.len(), 4);
    }

    #[test]
    fn test_display_is_canonical_order() {
        let set: CapabilitySet = [Capability::Time, Capability::HostCall].into_iter().collect();
        assert_eq!(set.to_string(), "host_call,time");
    }
}
