// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Engine configuration.
//!
//! Every field has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! unit = "demo.cn"
//!
//! [vm]
//! stack_words = 4096
//! echo_prints = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default value stack capacity, in words.
pub const DEFAULT_STACK_WORDS: usize = 1 << 16;

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Unit name used in diagnostics when none is given
    pub unit: String,

    /// Virtual machine settings
    pub vm: VmConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unit: "<input>".to_string(),
            vm: VmConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Configuration for the [`VM`](crate::vm::VM).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Value stack capacity in 4-byte words
    pub stack_words: usize,

    /// Label to start from instead of the program's own entry
    pub entry: Option<String>,

    /// Whether `print` also writes `> value` to stderr
    pub echo_prints: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_words: DEFAULT_STACK_WORDS,
            entry: None,
            echo_prints: true,
        }
    }
}

impl VmConfig {
    /// Default settings without echoing prints.
    pub fn quiet() -> Self {
        Self {
            echo_prints: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.unit, "<input>");
        assert_eq!(config.vm.stack_words, DEFAULT_STACK_WORDS);
        assert!(config.vm.echo_prints);
        assert!(config.vm.entry.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml("[vm]\nstack_words = 64\n").unwrap();
        assert_eq!(config.vm.stack_words, 64);
        assert!(config.vm.echo_prints);
        assert_eq!(config.unit, "<input>");
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EngineConfig::default();
        config.unit = "demo.cn".into();
        config.vm = VmConfig {
            stack_words: 128,
            entry: Some("start".into()),
            echo_prints: false,
        };
        let text = config.to_toml().unwrap();
        assert_eq!(EngineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            EngineConfig::from_toml("[vm]\nstack_words = \"lots\"\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cinder.toml");
        std::fs::write(&path, "unit = \"file.cn\"\n").unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap().unit, "file.cn");
        assert!(EngineConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
