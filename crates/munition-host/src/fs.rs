//! The `env::fs_read` / `env::fs_write` host functions.
//!
//! Guest paths are relative and resolve under the configured sandbox
//! root. Absolute paths and parent-directory components trap the guest;
//! ordinary I/O failures (missing file, permission) report `-1` so guests
//! can handle them.

use std::path::{Component, Path, PathBuf};

use munition_common::HostError;
use munition_core::{HostContext, Value};

use crate::arg_u32;

/// Guest-visible failure code.
const FS_ERR: i32 = -1;

/// Native implementation of `env::fs_read`.
///
/// `fs_read(path_ptr, path_len, buf_ptr, buf_cap) -> i32` reads the file
/// into guest memory (truncating at `buf_cap`) and returns the byte count
/// written, or `-1` on I/O failure or when no sandbox root is configured.
pub fn fs_read_native(ctx: &mut dyn HostContext, args: &[Value]) -> Result<Vec<Value>, HostError> {
    let path_ptr = arg_u32(args, 0)?;
    let path_len = arg_u32(args, 1)?;
    let buf_ptr = arg_u32(args, 2)?;
    let buf_cap = arg_u32(args, 3)?;

    let path = guest_path(ctx, path_ptr, path_len)?;
    let Some(resolved) = resolve(ctx, &path)? else {
        return Ok(vec![Value::I32(FS_ERR)]);
    };

    let data = match std::fs::read(&resolved) {
        Ok(data) => data,
        Err(_) => return Ok(vec![Value::I32(FS_ERR)]),
    };

    let take = data.len().min(buf_cap as usize);
    ctx.write_guest(buf_ptr, &data[..take])?;

    Ok(vec![Value::I32(take as i32)])
}

/// Native implementation of `env::fs_write`.
///
/// `fs_write(path_ptr, path_len, data_ptr, data_len) -> i32` writes guest
/// bytes to the file and returns the byte count, or `-1` on I/O failure
/// or when no sandbox root is configured.
pub fn fs_write_native(ctx: &mut dyn HostContext, args: &[Value]) -> Result<Vec<Value>, HostError> {
    let path_ptr = arg_u32(args, 0)?;
    let path_len = arg_u32(args, 1)?;
    let data_ptr = arg_u32(args, 2)?;
    let data_len = arg_u32(args, 3)?;

    let path = guest_path(ctx, path_ptr, path_len)?;
    let Some(resolved) = resolve(ctx, &path)? else {
        return Ok(vec![Value::I32(FS_ERR)]);
    };

    let data = ctx.read_guest(data_ptr, data_len)?;
    if std::fs::write(&resolved, &data).is_err() {
        return Ok(vec![Value::I32(FS_ERR)]);
    }

    Ok(vec![Value::I32(data.len().min(i32::MAX as usize) as i32)])
}

fn guest_path(
    ctx: &mut dyn HostContext,
    ptr: u32,
    len: u32,
) -> Result<String, HostError> {
    let bytes = ctx.read_guest(ptr, len)?;
    String::from_utf8(bytes)
        .map_err(|_| HostError::invalid_argument("path is not valid UTF-8"))
}

/// Confine a guest path to the sandbox root. `None` means no root is
/// configured; escape attempts are errors, not `-1`s.
fn resolve(ctx: &mut dyn HostContext, guest_path: &str) -> Result<Option<PathBuf>, HostError> {
    let relative = Path::new(guest_path);

    if relative.is_absolute() {
        return Err(HostError::PathEscape {
            path: guest_path.to_string(),
        });
    }
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(HostError::PathEscape {
                    path: guest_path.to_string(),
                })
            }
        }
    }

    Ok(ctx
        .host_config()
        .fs_root
        .as_ref()
        .map(|root| root.join(relative)))
}
