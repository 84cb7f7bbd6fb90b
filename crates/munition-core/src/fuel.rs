//! Fuel allocation policy.
//!
//! Pure functions of configuration and module shape; no mutable state.

use munition_common::InvocationConfig;

/// Fuel granted per byte of module when scaling by size.
const FUEL_PER_BYTE: u64 = 16;

/// Hard ceiling on scaled allocations, as a multiple of the default.
const MAX_SCALE: u64 = 64;

/// Fuel allocation policy.
#[derive(Debug, Clone)]
pub struct FuelPolicy {
    default_fuel: u64,
}

impl FuelPolicy {
    /// Build a policy from invocation configuration.
    pub fn new(config: &InvocationConfig) -> Self {
        Self {
            default_fuel: config.default_fuel,
        }
    }

    /// The configured default budget.
    pub fn default_fuel(&self) -> u64 {
        self.default_fuel
    }

    /// Scaled allocation for a module of `wasm_len` bytes.
    ///
    /// Larger modules get proportionally more fuel, never less than the
    /// default; `declared_complexity` multiplies the size-scaled budget.
    /// The result is clamped so a hostile declaration cannot make the
    /// budget unbounded.
    pub fn for_module(&self, wasm_len: usize, declared_complexity: Option<u32>) -> u64 {
        let sized = (wasm_len as u64)
            .saturating_mul(FUEL_PER_BYTE)
            .max(self.default_fuel);
        let complexity = u64::from(declared_complexity.unwrap_or(1).max(1));

        sized
            .saturating_mul(complexity)
            .min(self.default_fuel.saturating_mul(MAX_SCALE))
    }
}
