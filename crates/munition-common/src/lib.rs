//! Common types, errors, and utilities for munition.
//!
//! This crate provides shared functionality used across the munition
//! workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for framework settings
//! - TOML configuration file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{EngineConfig, HostConfig, InvocationConfig, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError};
pub use error::{
    CallError, CompileError, DumpEncodeError, DumpFormatError, HostError, InstantiateError,
    InstantiateFailure, MemoryError, TrapError, TrapKind, UnknownCapability,
};
