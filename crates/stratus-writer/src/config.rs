//! Writer configuration.
//!
//! Parameters that control when and where output is written.

use serde::{Deserialize, Serialize};
use stratus_types::constants::{DEFAULT_FILE_PREFIX, DEFAULT_GROUP};
use stratus_types::{StratusError, StratusResult};

/// Configuration for the field writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Write every `period` steps. 0 disables output.
    pub period: u32,

    /// Path prefix of output files; `<prefix>_<iteration>.<ext>` is written.
    pub file_prefix: String,

    /// Variable group the fields are declared in; also the dataset name prefix.
    pub group: String,

    /// Check that each write consumes the handle of the variable it expects.
    pub validate_declarations: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            period: 0,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            group: DEFAULT_GROUP.to_string(),
            validate_declarations: true,
        }
    }
}

impl WriterConfig {
    /// Writes every `period` steps with default names.
    pub fn every(period: u32) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> StratusResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| StratusError::InvalidConfig(format!("Writer config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects empty names.
    pub fn validate(&self) -> StratusResult<()> {
        if self.file_prefix.is_empty() {
            return Err(StratusError::InvalidConfig("file_prefix is empty".into()));
        }
        if self.group.is_empty() {
            return Err(StratusError::InvalidConfig("group is empty".into()));
        }
        Ok(())
    }

    /// Whether output is enabled at all.
    pub fn is_enabled(&self) -> bool {
        self.period > 0
    }

    /// Whether `step` is an output step.
    pub fn is_output_step(&self, step: u32) -> bool {
        self.is_enabled() && step % self.period == 0
    }
}
