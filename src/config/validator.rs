//! Pre-spawn validation of [`PtyConfig`].
//!
//! Validation touches the filesystem only to check that the working
//! directory exists. It never spawns anything and never caches: each
//! spawn attempt calls [`ConfigValidator::validate`] again.

use crate::config::loader::ConfigError;
use crate::config::types::PtyConfig;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Checks, in order:
    /// - command is not empty or whitespace
    /// - timeout is positive and finite
    /// - working directory, if set, exists and is a directory
    /// - environment keys are non-empty and contain neither `=` nor NUL
    pub fn validate(config: &PtyConfig) -> Result<&PtyConfig, ConfigError> {
        if config.command().trim().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }

        let timeout_secs = config.timeout_secs();
        if !(timeout_secs.is_finite() && timeout_secs > 0.0) {
            return Err(ConfigError::NonPositiveTimeout { timeout_secs });
        }

        if let Some(dir) = config.working_dir() {
            if !dir.is_dir() {
                return Err(ConfigError::MissingWorkingDirectory {
                    path: dir.to_path_buf(),
                });
            }
        }

        if let Some(key) = config.env().keys().find(|key| !is_valid_env_key(key)) {
            return Err(ConfigError::InvalidEnvKey { key: key.clone() });
        }

        Ok(config)
    }
}

fn is_valid_env_key(key: &str) -> bool {
    !key.is_empty() && !key.contains('=') && !key.contains('\0')
}

impl PtyConfig {
    /// Consume and return the config only if it passes validation.
    pub fn validated(self) -> Result<Self, ConfigError> {
        ConfigValidator::validate(&self)?;
        Ok(self)
    }
}
