//! Host function registration on a Wasmtime linker.
//!
//! For each capability-filtered binding the manager hands over, this
//! registers a trampoline that marshals `Val`s to the core value union,
//! builds a [`CallerHostContext`] over the caller, and invokes the native
//! implementation. A [`HostError`] becomes a guest trap carrying the
//! error; the runtime classifies it as `host_error` at the call boundary.

use thiserror::Error;
use wasmtime::{Engine, FuncType, Linker, Val, ValType};

use munition_common::{HostError, InstantiateError, InstantiateFailure};
use munition_core::{HostFunctionBinding, Value, ValueKind};

use crate::context::{CallerHostContext, SandboxContext};

/// Marker wrapped around a [`HostError`] so the call-site error mapping
/// can recognize a failed host callback in the trap chain.
#[derive(Debug, Error)]
#[error("host function failed: {0}")]
pub(crate) struct HostCallFailed(pub(crate) HostError);

/// Register one binding on the linker.
pub(crate) fn register(
    linker: &mut Linker<SandboxContext>,
    engine: &Engine,
    binding: &'static HostFunctionBinding,
) -> Result<(), InstantiateFailure> {
    let params = binding.signature.params.iter().copied().map(kind_to_valtype);
    let results = binding.signature.results.iter().copied().map(kind_to_valtype);
    let ty = FuncType::new(engine, params, results);

    linker
        .func_new(binding.namespace, binding.name, ty, move |mut caller, params, results| {
            let mut args = Vec::with_capacity(params.len());
            for param in params {
                let value = val_to_value(param).ok_or_else(|| {
                    wasmtime::Error::new(HostCallFailed(HostError::invalid_argument(
                        "unsupported parameter type",
                    )))
                })?;
                args.push(value);
            }

            let memory = caller
                .get_export("memory")
                .and_then(wasmtime::Extern::into_memory);
            let mut ctx = CallerHostContext {
                caller: &mut caller,
                memory,
            };

            let values = (binding.native)(&mut ctx, &args)
                .map_err(|err| wasmtime::Error::new(HostCallFailed(err)))?;

            if values.len() != results.len() {
                return Err(wasmtime::Error::new(HostCallFailed(
                    HostError::invalid_argument(format!(
                        "host function `{}::{}` returned {} values, expected {}",
                        binding.namespace,
                        binding.name,
                        values.len(),
                        results.len()
                    )),
                )));
            }
            for (slot, value) in results.iter_mut().zip(values) {
                *slot = value_to_val(&value);
            }

            Ok(())
        })
        .map_err(|err| {
            InstantiateFailure::new(InstantiateError::Trap(munition_common::TrapError::new(
                munition_common::TrapKind::Unknown,
                format!(
                    "failed to register `{}::{}`: {err}",
                    binding.namespace, binding.name
                ),
            )))
        })?;

    Ok(())
}

pub(crate) fn kind_to_valtype(kind: ValueKind) -> ValType {
    match kind {
        ValueKind::I32 => ValType::I32,
        ValueKind::I64 => ValType::I64,
        ValueKind::F32 => ValType::F32,
        ValueKind::F64 => ValType::F64,
    }
}

pub(crate) fn valtype_to_kind(ty: &ValType) -> Option<ValueKind> {
    match ty {
        ValType::I32 => Some(ValueKind::I32),
        ValType::I64 => Some(ValueKind::I64),
        ValType::F32 => Some(ValueKind::F32),
        ValType::F64 => Some(ValueKind::F64),
        _ => None,
    }
}

pub(crate) fn value_to_val(value: &Value) -> Val {
    match value {
        Value::I32(v) => Val::I32(*v),
        Value::I64(v) => Val::I64(*v),
        Value::F32(v) => Val::F32(v.to_bits()),
        Value::F64(v) => Val::F64(v.to_bits()),
    }
}

pub(crate) fn val_to_value(val: &Val) -> Option<Value> {
    match val {
        Val::I32(v) => Some(Value::I32(*v)),
        Val::I64(v) => Some(Value::I64(*v)),
        Val::F32(bits) => Some(Value::F32(f32::from_bits(*bits))),
        Val::F64(bits) => Some(Value::F64(f64::from_bits(*bits))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_val_round_trip() {
        let values = [
            Value::I32(-5),
            Value::I64(1 << 40),
            Value::F32(0.25),
            Value::F64(f64::NAN),
        ];
        for value in values {
            let val = value_to_val(&value);
            assert_eq!(val_to_value(&val), Some(value));
        }
    }

    #[test]
    fn test_valtype_mapping() {
        for kind in [ValueKind::I32, ValueKind::I64, ValueKind::F32, ValueKind::F64] {
            let ty = kind_to_valtype(kind);
            assert_eq!(valtype_to_kind(&ty), Some(kind));
        }
        assert_eq!(valtype_to_kind(&ValType::V128), None);
    }
}
