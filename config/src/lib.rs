//! # Configuration System
//!
//! Typed configuration for the Redis-structure mirror.
//!
//! This crate provides:
//! - Environment file loading layered over the process environment
//! - Schema-driven type coercion with precise error reporting
//! - MongoDB connection settings built on top of both

pub mod loader;
pub mod mongo;

pub use loader::{
    ConfigError, ConfigSchema, ConfigValue, EnvSource, SchemaEntry, TypedConfig, ValueType,
};
pub use mongo::{DEFAULT_ENV_FILE, MongoConfig};
pub use validator::Validate;
