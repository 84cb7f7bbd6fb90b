//! The `env::net_probe` host function: name resolution reachability
//! check, the only network surface munition exposes to guests.

use std::net::ToSocketAddrs;

use munition_common::HostError;
use munition_core::{HostContext, Value};

use crate::{arg_i32, arg_u32};

/// Native implementation of `env::net_probe`.
///
/// `net_probe(host_ptr, host_len, port) -> i32` resolves `host:port` and
/// returns `1` when at least one address resolves, `0` otherwise.
pub fn net_probe_native(ctx: &mut dyn HostContext, args: &[Value]) -> Result<Vec<Value>, HostError> {
    let host_ptr = arg_u32(args, 0)?;
    let host_len = arg_u32(args, 1)?;
    let port = arg_i32(args, 2)?;

    let port = u16::try_from(port)
        .map_err(|_| HostError::invalid_argument(format!("port {port} out of range")))?;

    let bytes = ctx.read_guest(host_ptr, host_len)?;
    let host = String::from_utf8(bytes)
        .map_err(|_| HostError::invalid_argument("host is not valid UTF-8"))?;

    let reachable = (host.as_str(), port)
        .to_socket_addrs()
        .map(|mut addrs| addrs.next().is_some())
        .unwrap_or(false);

    Ok(vec![Value::I32(i32::from(reachable))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testctx::MockHostContext;

    #[test]
    fn test_probe_localhost_resolves() {
        let mut ctx = MockHostContext::new(64);
        ctx.plant(0, b"127.0.0.1");

        let args = [Value::I32(0), Value::I32(9), Value::I32(80)];
        let results = net_probe_native(&mut ctx, &args).unwrap();
        assert_eq!(results[0].as_i32(), Some(1));
    }

    #[test]
    fn test_probe_garbage_does_not_resolve() {
        let mut ctx = MockHostContext::new(64);
        ctx.plant(0, b"not a hostname!");

        let args = [Value::I32(0), Value::I32(15), Value::I32(80)];
        let results = net_probe_native(&mut ctx, &args).unwrap();
        assert_eq!(results[0].as_i32(), Some(0));
    }

    #[test]
    fn test_probe_rejects_bad_port() {
        let mut ctx = MockHostContext::new(64);
        ctx.plant(0, b"localhost");

        let args = [Value::I32(0), Value::I32(9), Value::I32(-1)];
        assert!(net_probe_native(&mut ctx, &args).is_err());
    }
}
