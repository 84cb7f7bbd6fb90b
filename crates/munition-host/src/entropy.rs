//! The `env::random_fill` host function: fills a guest buffer with
//! OS-quality random bytes.

use rand::RngCore;

use munition_common::HostError;
use munition_core::{HostContext, Value};

use crate::arg_u32;

/// Largest single fill, to keep a hostile guest from turning the host
/// into an entropy pump.
const MAX_FILL_BYTES: u32 = 1 << 20;

/// Native implementation of `env::random_fill`.
pub fn random_fill_native(
    ctx: &mut dyn HostContext,
    args: &[Value],
) -> Result<Vec<Value>, HostError> {
    let ptr = arg_u32(args, 0)?;
    let len = arg_u32(args, 1)?;

    if len > MAX_FILL_BYTES {
        return Err(HostError::invalid_argument(format!(
            "random_fill length {len} exceeds {MAX_FILL_BYTES}"
        )));
    }

    let mut buf = vec![0u8; len as usize];
    rand::thread_rng().fill_bytes(&mut buf);
    ctx.write_guest(ptr, &buf)?;

    Ok(Vec::new())
}
