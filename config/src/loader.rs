//! # Environment Loader
//!
//! Reads settings from an environment file merged with the process
//! environment, then coerces every value to the type the caller expects.
//!
//! # Lookup Order
//! 1. The environment file (when it exists)
//! 2. The process environment
//!
//! A missing environment file is not an error: it contributes no values and
//! every lookup falls through to the process environment.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::{Path, PathBuf};
use strum::Display;
use tracing::debug;

/// Configuration loading error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "Configuration for {key} not found. Please ensure {env_var} is set in the environment or the env file."
    )]
    MissingConfig { key: String, env_var: String },

    #[error("Invalid type for {key}: {value}. Expected {expected}.")]
    InvalidConfigType {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Failed to read env file {path}: {reason}")]
    EnvFile { path: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    Validation { reason: String },
}

/// Primitive type a configuration value must coerce to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
}

/// A configuration value after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl ConfigValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            ConfigValue::String(_) => ValueType::String,
            ConfigValue::Integer(_) => ValueType::Integer,
            ConfigValue::Float(_) => ValueType::Float,
            ConfigValue::Boolean(_) => ValueType::Boolean,
        }
    }
}

impl ValueType {
    /// Coerce a raw string into this type, or `None` when it does not parse.
    pub fn coerce(self, raw: &str) -> Option<ConfigValue> {
        match self {
            ValueType::String => Some(ConfigValue::String(raw.to_string())),
            ValueType::Integer => raw.trim().parse().ok().map(ConfigValue::Integer),
            ValueType::Float => raw.trim().parse().ok().map(ConfigValue::Float),
            ValueType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(ConfigValue::Boolean(true)),
                "false" | "0" | "no" => Some(ConfigValue::Boolean(false)),
                _ => None,
            },
        }
    }
}

/// One expected setting: the logical key it is stored under, the variable it
/// is read from, and the type it must coerce to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub key: &'static str,
    pub env_var: &'static str,
    pub value_type: ValueType,
}

/// Ordered set of expected settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSchema {
    entries: Vec<SchemaEntry>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, key: &'static str, env_var: &'static str, value_type: ValueType) -> Self {
        self.entries.push(SchemaEntry {
            key,
            env_var,
            value_type,
        });
        self
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }
}

/// Settings after every schema entry has been found and coerced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedConfig {
    values: BTreeMap<String, ConfigValue>,
}

impl TypedConfig {
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ConfigError> {
        match self.lookup(key)? {
            ConfigValue::String(s) => Ok(s),
            other => Err(mismatch(key, other, ValueType::String)),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        match self.lookup(key)? {
            ConfigValue::Integer(i) => Ok(*i),
            other => Err(mismatch(key, other, ValueType::Integer)),
        }
    }

    pub fn get_float(&self, key: &str) -> Result<f64, ConfigError> {
        match self.lookup(key)? {
            ConfigValue::Float(f) => Ok(*f),
            other => Err(mismatch(key, other, ValueType::Float)),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        match self.lookup(key)? {
            ConfigValue::Boolean(b) => Ok(*b),
            other => Err(mismatch(key, other, ValueType::Boolean)),
        }
    }

    fn lookup(&self, key: &str) -> Result<&ConfigValue, ConfigError> {
        self.values.get(key).ok_or_else(|| ConfigError::MissingConfig {
            key: key.to_string(),
            env_var: key.to_string(),
        })
    }
}

fn mismatch(key: &str, found: &ConfigValue, expected: ValueType) -> ConfigError {
    ConfigError::InvalidConfigType {
        key: key.to_string(),
        value: format!("{:?}", found),
        expected: expected.to_string(),
    }
}

/// Environment file values layered over the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    path: Option<PathBuf>,
    file_values: HashMap<String, String>,
}

impl EnvSource {
    /// Load an environment file.
    ///
    /// A file that does not exist yields an empty file layer. A file that
    /// exists but cannot be parsed is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file_error = |reason: String| ConfigError::EnvFile {
            path: path.display().to_string(),
            reason,
        };

        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => {
                debug!(path = %path.display(), "env file not found, using process environment only");
                return Ok(Self {
                    path: Some(path.to_path_buf()),
                    file_values: HashMap::new(),
                });
            }
            Err(e) => return Err(file_error(e.to_string())),
        };

        let mut file_values = HashMap::new();
        for item in iter {
            let (name, value) = item.map_err(|e| file_error(e.to_string()))?;
            file_values.insert(name, value);
        }

        debug!(path = %path.display(), count = file_values.len(), "loaded env file");
        Ok(Self {
            path: Some(path.to_path_buf()),
            file_values,
        })
    }

    /// A source whose file layer is the given pairs.
    pub fn from_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            path: None,
            file_values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look a variable up in the file first, then the process environment.
    pub fn lookup(&self, env_var: &str) -> Option<String> {
        self.file_values
            .get(env_var)
            .cloned()
            .or_else(|| env::var(env_var).ok())
    }

    /// Resolve and coerce every schema entry.
    ///
    /// Fails on the first entry that is absent from both layers or whose
    /// value does not coerce to the declared type.
    pub fn type_check_and_map(&self, schema: &ConfigSchema) -> Result<TypedConfig, ConfigError> {
        let mut values = BTreeMap::new();

        for entry in schema.entries() {
            let raw = self
                .lookup(entry.env_var)
                .ok_or_else(|| ConfigError::MissingConfig {
                    key: entry.key.to_string(),
                    env_var: entry.env_var.to_string(),
                })?;

            let value = entry.value_type.coerce(&raw).ok_or_else(|| {
                ConfigError::InvalidConfigType {
                    key: entry.key.to_string(),
                    value: raw.clone(),
                    expected: entry.value_type.to_string(),
                }
            })?;

            values.insert(entry.key.to_string(), value);
        }

        Ok(TypedConfig { values })
    }
}
