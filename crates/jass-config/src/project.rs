//! Project Configuration (jass.toml)
//!
//! Handles the `[vm]` limits table stored in a project's `jass.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of active call frames allowed before the VM reports
/// call-stack exhaustion.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 4096;

/// Default number of operand stack entries allowed.
pub const DEFAULT_MAX_OPERAND_STACK: usize = 65_536;

/// Project configuration from jass.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Virtual machine limits
    #[serde(default)]
    pub vm: VmConfig,
}

/// Execution limits enforced by the virtual machine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct VmConfig {
    /// Maximum number of active call frames
    pub max_call_depth: usize,

    /// Maximum number of values on the operand stack
    pub max_operand_stack: usize,

    /// Maximum number of instructions executed per `start`/`resume` call.
    /// `None` means unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction_limit: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_operand_stack: DEFAULT_MAX_OPERAND_STACK,
            instruction_limit: None,
        }
    }
}

impl VmConfig {
    /// Builder-style override for the instruction budget
    pub fn with_instruction_limit(mut self, limit: u64) -> Self {
        self.instruction_limit = Some(limit);
        self
    }

    /// Builder-style override for the call depth
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Reject limits the VM cannot run under
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_call_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "vm.max_call_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_operand_stack == 0 {
            return Err(ConfigError::InvalidValue {
                field: "vm.max_operand_stack".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.instruction_limit == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "vm.instruction_limit".to_string(),
                reason: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.vm.validate()
    }
}
