//! Resource limits applied while parsing and evaluating formulas.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid engine configuration: {0}")]
    Parse(String),
    #[error("Configuration value '{field}' must be greater than zero")]
    ZeroLimit { field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Longest formula text accepted, in bytes.
    pub max_formula_length: usize,
    /// Deepest expression nesting the parser will follow.
    pub max_nesting_depth: usize,
    /// Expression nodes one evaluation may visit before it is aborted.
    pub max_steps: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_formula_length: 16 * 1024,
            max_nesting_depth: 256,
            max_steps: 100_000,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document; absent fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_formula_length == 0 {
            return Err(ConfigError::ZeroLimit { field: "maxFormulaLength" });
        }
        if self.max_nesting_depth == 0 {
            return Err(ConfigError::ZeroLimit { field: "maxNestingDepth" });
        }
        if self.max_steps == 0 {
            return Err(ConfigError::ZeroLimit { field: "maxSteps" });
        }
        Ok(())
    }
}
