//! Configuration Loader
//!
//! Handles loading configuration and applying environment overrides with proper precedence.

use crate::project::{ProjectConfig, VmConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the project configuration file searched for by the loader
pub const CONFIG_FILE_NAME: &str = "jass.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Project config (./jass.toml) - lowest priority
/// 2. Environment variables (JASS_*) - overrides project
/// 3. CLI flags - highest priority (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader;

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Project root directory (where jass.toml was found)
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// VM limits after all overrides
    pub fn vm(&self) -> &VmConfig {
        &self.project.vm
    }

    /// Whether a jass.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find jass.toml, then applies
    /// environment overrides. Missing files fall back to defaults.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;
        let project = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let project = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project,
            project_root: config_path.parent().map(|p| p.to_path_buf()),
        })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Apply JASS_* environment variable overrides
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Some(depth) = env_number::<usize>("JASS_MAX_CALL_DEPTH")? {
            config.vm.max_call_depth = depth;
        }

        if let Some(size) = env_number::<usize>("JASS_MAX_OPERAND_STACK")? {
            config.vm.max_operand_stack = size;
        }

        if let Ok(limit) = env::var("JASS_INSTRUCTION_LIMIT") {
            config.vm.instruction_limit = match limit.trim() {
                "" | "none" | "unlimited" => None,
                value => Some(parse_number("JASS_INSTRUCTION_LIMIT", value)?),
            };
        }

        config.validate()?;
        Ok(config)
    }
}

fn env_number<T: std::str::FromStr>(var: &str) -> ConfigResult<Option<T>> {
    match env::var(var) {
        Ok(value) => parse_number(var, value.trim()).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        field: var.to_string(),
        reason: format!("expected a non-negative integer, got '{}'", value),
    })
}
