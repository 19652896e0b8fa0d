// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

/// Where variables are read from.
#[derive(Debug, Clone)]
enum Source {
    Process,
    Map(HashMap<String, String>),
}

/// Environment variable loader
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: Option<String>,
    source: Source,
}

impl EnvLoader {
    /// Create a loader over the process environment
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix,
            source: Source::Process,
        }
    }

    /// Create a loader over a fixed set of variables
    pub fn from_map<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: None,
            source: Source::Map(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    fn full_key(&self, key: &str) -> String {
        match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }

    fn raw(&self, key: &str) -> Result<String> {
        match &self.source {
            Source::Process => env::var(key).map_err(ConfigError::EnvError),
            Source::Map(vars) => vars
                .get(key)
                .cloned()
                .ok_or_else(|| ConfigError::KeyNotFound(key.to_string())),
        }
    }

    /// Load a specific variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        self.raw(&self.full_key(key))
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Load and parse a variable
    pub fn load_parsed<T: FromStr>(&self, key: &str) -> Result<T> {
        let raw = self.load_var(key)?;
        raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        })
    }

    /// First non-empty variable among `keys`, in order
    pub fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.load_var(key).ok())
            .find(|value| !value.trim().is_empty())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
