//! Injector options.
//!
//! Options are set on a [`BindingCollection`](crate::BindingCollection)
//! before it is built, either in code or loaded from a [`ConfigSource`]
//! such as the process environment.

use std::collections::HashMap;
use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

/// Prefix of the environment variables read by [`InjectorOptions::from_env`].
pub const ENV_PREFIX: &str = "FERROUS_INJECT";

/// How eagerly the injector works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum Stage {
    /// Singletons are created on first request.
    #[default]
    Development,
    /// Every explicitly bound singleton is created while building.
    Production,
}

/// Options applied to an injector and all of its environments.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{BindingCollection, InjectorOptions, Stage};
///
/// let options = InjectorOptions {
///     stage: Stage::Production,
///     ..InjectorOptions::default()
/// };
/// let injector = BindingCollection::new().with_options(options).build().unwrap();
/// assert_eq!(injector.options().stage, Stage::Production);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct InjectorOptions {
    pub stage: Stage,
    /// Break cycles on deferred edges with placeholders. When off, every
    /// cycle is a [`DiError::CircularDependency`].
    pub circular_placeholders: bool,
    /// Disable just-in-time bindings.
    pub require_explicit_bindings: bool,
    /// Maximum nesting of resolutions on one call stack.
    pub max_depth: usize,
}

impl Default for InjectorOptions {
    fn default() -> Self {
        Self {
            stage: Stage::Development,
            circular_placeholders: true,
            require_explicit_bindings: false,
            max_depth: 1024,
        }
    }
}

impl InjectorOptions {
    /// Reads `FERROUS_INJECT_STAGE`, `FERROUS_INJECT_CIRCULAR_PLACEHOLDERS`,
    /// `FERROUS_INJECT_REQUIRE_EXPLICIT_BINDINGS` and
    /// `FERROUS_INJECT_MAX_DEPTH`; unset variables keep their defaults.
    pub fn from_env() -> DiResult<Self> {
        Self::load(&EnvironmentConfigSource::with_prefix(ENV_PREFIX))
    }

    /// Reads options from `source`; missing keys keep their defaults.
    pub fn load(source: &dyn ConfigSource) -> DiResult<Self> {
        let mut options = Self::default();
        if let Some(value) = source.get("stage") {
            options.stage = match value.as_string()?.to_ascii_lowercase().as_str() {
                "development" | "dev" => Stage::Development,
                "production" | "prod" => Stage::Production,
                other => {
                    return Err(DiError::Configuration(format!("unknown stage `{}`", other)))
                }
            };
        }
        if let Some(value) = source.get("circular_placeholders") {
            options.circular_placeholders = value.as_bool()?;
        }
        if let Some(value) = source.get("require_explicit_bindings") {
            options.require_explicit_bindings = value.as_bool()?;
        }
        if let Some(value) = source.get("max_depth") {
            let depth = value.as_i64()?;
            if depth <= 0 {
                return Err(DiError::Configuration(format!(
                    "max_depth must be positive, got {}",
                    depth
                )));
            }
            options.max_depth = depth as usize;
        }
        Ok(options)
    }

    /// Parses options from JSON; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DiError::Configuration(format!("invalid injector options: {}", e)))
    }
}

/// A configuration value that can be various types
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl ConfigValue {
    /// Parses a raw string, trying integer, then boolean.
    pub fn parse(raw: &str) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            ConfigValue::Integer(int_val)
        } else if let Ok(bool_val) = raw.parse::<bool>() {
            ConfigValue::Boolean(bool_val)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    pub fn as_string(&self) -> DiResult<&str> {
        match self {
            ConfigValue::String(s) => Ok(s),
            other => Err(mismatch("a string", other)),
        }
    }

    pub fn as_i64(&self) -> DiResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            other => Err(mismatch("an integer", other)),
        }
    }

    pub fn as_bool(&self) -> DiResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            other => Err(mismatch("a boolean", other)),
        }
    }
}

fn mismatch(expected: &str, found: &ConfigValue) -> DiError {
    DiError::Configuration(format!("expected {}, found {:?}", expected, found))
}

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Get a configuration value by key
    fn get(&self, key: &str) -> Option<ConfigValue>;
}

/// Environment variable configuration source
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    /// Prefix to filter environment variables
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        let env_key = match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        };
        env::var(&env_key).ok().map(|value| ConfigValue::parse(&value))
    }
}

/// In-memory source, handy for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }
}
