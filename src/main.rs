//! Munition CLI entry point.
//!
//! Fires a single WebAssembly module and prints the result. On a crash,
//! the forensic dump is written next to the module as `<module>.mdmp`.
//!
//! ```text
//! munition <module.wasm> <function> [arg ...]
//! ```
//!
//! Arguments are typed by suffix (`7`, `7i64`, `2.5f32`, `2.5` = f64 when
//! fractional). Environment:
//! - `MUNITION_CONFIG`: TOML configuration file
//! - `MUNITION_CAPS`: comma-separated capability atoms/aliases
//! - `MUNITION_FUEL`: fuel budget, or `scaled` for a size-scaled budget
//! - `MUNITION_TIMEOUT_MS`: wall-clock timeout

use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use munition::{ConfigFile, FireOptions, InvocationResult, RuntimeConfig, Value};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,munition=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(module_path), Some(function)) = (args.next(), args.next()) else {
        bail!("usage: munition <module.wasm> <function> [arg ...]");
    };
    let module_path = PathBuf::from(module_path);

    let call_args = args
        .map(|arg| parse_value(&arg))
        .collect::<anyhow::Result<Vec<Value>>>()?;

    let config = match std::env::var("MUNITION_CONFIG") {
        Ok(path) => ConfigFile::from_file(&path)
            .with_context(|| format!("loading config from {path}"))?
            .runtime,
        Err(_) => RuntimeConfig::default(),
    };

    let wasm = std::fs::read(&module_path)
        .with_context(|| format!("reading module {}", module_path.display()))?;

    let mut options = FireOptions::default();
    if let Ok(caps) = std::env::var("MUNITION_CAPS") {
        options = options.with_capabilities(caps.split(',').map(str::trim).map(str::to_string));
    }
    if let Ok(timeout) = std::env::var("MUNITION_TIMEOUT_MS") {
        options = options.with_timeout_ms(timeout.parse().context("MUNITION_TIMEOUT_MS")?);
    }

    let manager = munition::manager(&config);

    if let Ok(fuel) = std::env::var("MUNITION_FUEL") {
        let fuel = if fuel == "scaled" {
            manager.fuel_policy().for_module(wasm.len(), None)
        } else {
            fuel.parse().context("MUNITION_FUEL")?
        };
        options = options.with_fuel(fuel);
    }

    info!(
        module = %module_path.display(),
        function = %function,
        "firing invocation"
    );

    match manager.fire(&wasm, &function, &call_args, options).await {
        InvocationResult::Ok { values, metadata } => {
            for value in &values {
                println!("{value}");
            }
            info!(
                fuel_remaining = metadata.fuel_remaining,
                wall_time_us = metadata.wall_time_ns / 1_000,
                "invocation completed"
            );
            Ok(())
        }
        InvocationResult::Crash(dump) => {
            let dump_path = module_path.with_extension("mdmp");
            let encoded = dump.encode().context("encoding forensic dump")?;
            std::fs::write(&dump_path, encoded)
                .with_context(|| format!("writing dump to {}", dump_path.display()))?;

            bail!(
                "invocation crashed: {} (dump: {}, fuel consumed: {}, wall time: {}us)",
                dump.cause,
                dump_path.display(),
                dump.fuel_consumed,
                dump.wall_time_ns / 1_000
            );
        }
    }
}

/// Parse a CLI argument into a typed value by suffix.
fn parse_value(arg: &str) -> anyhow::Result<Value> {
    if let Some(raw) = arg.strip_suffix("i64") {
        return Ok(Value::I64(raw.parse()?));
    }
    if let Some(raw) = arg.strip_suffix("i32") {
        return Ok(Value::I32(raw.parse()?));
    }
    if let Some(raw) = arg.strip_suffix("f32") {
        return Ok(Value::F32(raw.parse()?));
    }
    if let Some(raw) = arg.strip_suffix("f64") {
        return Ok(Value::F64(raw.parse()?));
    }
    if arg.contains('.') {
        return Ok(Value::F64(arg.parse()?));
    }
    Ok(Value::I32(arg.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_suffixes() {
        assert_eq!(parse_value("7").unwrap(), Value::I32(7));
        assert_eq!(parse_value("-7").unwrap(), Value::I32(-7));
        assert_eq!(parse_value("7i64").unwrap(), Value::I64(7));
        assert_eq!(parse_value("0.5f32").unwrap(), Value::F32(0.5));
        assert_eq!(parse_value("0.5f64").unwrap(), Value::F64(0.5));
        assert_eq!(parse_value("2.25").unwrap(), Value::F64(2.25));
        assert!(parse_value("nope").is_err());
    }
}
