//! The `env::clock_ns` host function: wall clock in nanoseconds since the
//! Unix epoch, as `i64`.

use std::time::{SystemTime, UNIX_EPOCH};

use munition_common::HostError;
use munition_core::{HostContext, Value};

/// Native implementation of `env::clock_ns`.
pub fn clock_ns_native(
    _ctx: &mut dyn HostContext,
    _args: &[Value],
) -> Result<Vec<Value>, HostError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);

    Ok(vec![Value::I64(now)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testctx::MockHostContext;

    #[test]
    fn test_clock_returns_plausible_timestamp() {
        let mut ctx = MockHostContext::new(0);
        let results = clock_ns_native(&mut ctx, &[]).unwrap();

        assert_eq!(results.len(), 1);
        let ns = results[0].as_i64().unwrap();
        // After 2020-01-01 in nanoseconds.
        assert!(ns > 1_577_836_800_000_000_000);
    }

    #[test]
    fn test_clock_is_monotonic_enough() {
        let mut ctx = MockHostContext::new(0);
        let a = clock_ns_native(&mut ctx, &[]).unwrap()[0].as_i64().unwrap();
        let b = clock_ns_native(&mut ctx, &[]).unwrap()[0].as_i64().unwrap();
        assert!(b >= a);
    }
}
