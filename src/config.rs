//! Runtime configuration.
//!
//! Defaults here are the behavior of a bare `Runtime::new()`; a TOML file can
//! override them section by section.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub load: LoadConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// When set, every load replaces the backend's prior modules instead of
    /// accumulating symbols alongside them.
    #[serde(default = "default_false")]
    pub isolation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_true")]
    pub compact: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self { isolation: false }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            compact: true,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|err| format!("cannot read {}: {}", path.as_ref().display(), err))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|err| format!("invalid config: {}", err))
    }
}

/// Per-call load options. Unset fields fall back to [`Config`] defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Replace this backend's prior modules instead of accumulating.
    pub isolation: bool,
    /// Explicit module name; defaults to the first source's stem.
    pub module_name: Option<String>,
}

impl LoadOptions {
    pub fn isolated() -> Self {
        Self { isolation: true, module_name: None }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { isolation: false, module_name: Some(name.into()) }
    }
}

fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}
