//! Machine configuration.
//!
//! Loaded from a JSON file such as:
//!
//! ```json
//! { "memory_words": 4096, "load_base": 16, "entry": 16, "max_cycles": 50000 }
//! ```
//!
//! Every field is optional. Command-line flags override file values.

use crate::cpu::memory::DEFAULT_MEMORY_WORDS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default cycle budget for [`Cpu::run`](crate::Cpu::run).
pub const DEFAULT_MAX_CYCLES: u64 = 100_000;

/// Shape of the machine a program runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Number of 32-bit memory words.
    pub memory_words: usize,
    /// Address the program image is copied to.
    pub load_base: u32,
    /// Initial program counter.
    pub entry: u32,
    /// Cycle budget for a run; `None` runs until halt or fault.
    pub max_cycles: Option<u64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_words: DEFAULT_MEMORY_WORDS,
            load_base: 0,
            entry: 0,
            max_cycles: Some(DEFAULT_MAX_CYCLES),
        }
    }
}

impl MachineConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: MachineConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Check that the layout describes a usable machine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_words == 0 {
            return Err(ConfigError::Invalid("memory_words must be at least 1".into()));
        }
        if self.memory_words > i32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "memory_words {} exceeds the addressable range",
                self.memory_words
            )));
        }
        if self.load_base as usize > self.memory_words {
            return Err(ConfigError::Invalid(format!(
                "load_base {} is beyond memory of {} words",
                self.load_base, self.memory_words
            )));
        }
        if self.entry as usize >= self.memory_words {
            return Err(ConfigError::Invalid(format!(
                "entry {} is beyond memory of {} words",
                self.entry, self.memory_words
            )));
        }
        Ok(())
    }
}

/// Errors that can occur loading a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(String),

    #[error("malformed config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.memory_words, 1024);
        assert_eq!(config.load_base, 0);
        assert_eq!(config.entry, 0);
        assert_eq!(config.max_cycles, Some(100_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = MachineConfig::from_json(r#"{ "load_base": 32, "entry": 32 }"#).unwrap();
        assert_eq!(config.memory_words, 1024);
        assert_eq!(config.load_base, 32);
        assert_eq!(config.entry, 32);
        assert_eq!(config.max_cycles, Some(100_000));
    }

    #[test]
    fn test_unlimited_cycles() {
        let config = MachineConfig::from_json(r#"{ "max_cycles": null }"#).unwrap();
        assert_eq!(config.max_cycles, None);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            MachineConfig::from_json("{ memory_words: 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_layout() {
        assert!(matches!(
            MachineConfig::from_json(r#"{ "memory_words": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MachineConfig::from_json(r#"{ "memory_words": 8, "entry": 8 }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MachineConfig::load("/nonexistent/duck.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
