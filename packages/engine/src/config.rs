//! Interpreter limits.
//!
//! Configuration specifies constraints only; enforcement is handled by the
//! interpreter.

use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// Hosts usually embed this in their own settings; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest register window a chunk may ask for.
    pub max_registers: usize,

    /// Instructions one chunk may execute before it is abandoned.
    pub max_steps: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_registers: 250,
            max_steps: 1_000_000,
        }
    }
}

impl Config {
    /// Create a new configuration with default limits
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"max_steps": 10}"#).unwrap();
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.max_registers, Config::default().max_registers);
    }

    #[test]
    fn serializes_every_field() {
        let json = serde_json::to_value(Config::new()).unwrap();
        assert_eq!(json["max_registers"], 250);
        assert_eq!(json["max_steps"], 1_000_000);
    }
}
