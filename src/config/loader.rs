use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::PtyConfig;

/// Errors raised while loading or validating a [`PtyConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Shell command cannot be empty")]
    EmptyCommand,

    #[error("Timeout must be positive, got {timeout_secs}")]
    NonPositiveTimeout { timeout_secs: f64 },

    #[error("Working directory does not exist: {}", path.display())]
    MissingWorkingDirectory { path: PathBuf },

    #[error("Invalid environment variable name '{key}'")]
    InvalidEnvKey { key: String },

    #[error("Unknown configuration key: {key}")]
    UnknownKey { key: String },

    #[error("Failed to merge configuration: {message}")]
    MergeError { message: String },
}

impl PtyConfig {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/ptyvisor/config.toml` on Unix/macOS, or the
    /// platform equivalent via `dirs::config_dir()`. Falls back to the
    /// current directory when no config dir is known.
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("ptyvisor").join("config.toml")
    }

    /// Load from the default path, or `PtyConfig::default()` when the file
    /// doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Parse a TOML config file. Missing keys take their defaults.
    ///
    /// The result is not validated here; spawning validates it.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Produce a new config with the given top-level keys replaced.
    ///
    /// Keys that are not config fields are rejected rather than ignored.
    pub fn merged(&self, overrides: &toml::Table) -> Result<Self, ConfigError> {
        let mut table = match toml::Value::try_from(self) {
            Ok(toml::Value::Table(table)) => table,
            Ok(_) => {
                return Err(ConfigError::MergeError {
                    message: "config did not serialize to a table".to_string(),
                })
            }
            Err(e) => {
                return Err(ConfigError::MergeError {
                    message: e.to_string(),
                })
            }
        };

        for (key, value) in overrides {
            if !is_known_key(key) {
                return Err(ConfigError::UnknownKey { key: key.clone() });
            }
            table.insert(key.clone(), value.clone());
        }

        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::MergeError {
                message: e.to_string(),
            })
    }
}

// `working_dir` is omitted from the serialized table when unset, so the
// known keys can't be read back off `self`.
fn is_known_key(key: &str) -> bool {
    matches!(
        key,
        "command" | "args" | "env" | "working_dir" | "timeout_secs"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_replaces_known_keys() {
        let base = PtyConfig::new("/bin/sh").with_args(["-c", "true"]);
        let overrides: toml::Table = toml::from_str("command = \"/bin/bash\"\ntimeout_secs = 5.0")
            .expect("valid toml");

        let merged = base.merged(&overrides).expect("merge should succeed");
        assert_eq!(merged.command(), "/bin/bash");
        assert_eq!(merged.args(), ["-c", "true"]);
        assert_eq!(merged.timeout_secs(), 5.0);
        // base is untouched
        assert_eq!(base.command(), "/bin/sh");
    }

    #[test]
    fn merge_rejects_unknown_keys() {
        let base = PtyConfig::new("/bin/sh");
        let overrides: toml::Table = toml::from_str("shell_flavour = \"fish\"").expect("valid toml");

        let err = base.merged(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { ref key } if key == "shell_flavour"));
    }

    #[test]
    fn merge_rejects_wrong_types() {
        let base = PtyConfig::new("/bin/sh");
        let overrides: toml::Table = toml::from_str("args = 3").expect("valid toml");

        assert!(matches!(
            base.merged(&overrides),
            Err(ConfigError::MergeError { .. })
        ));
    }
}
