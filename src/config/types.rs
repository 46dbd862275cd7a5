use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shells tried, in order, when `$SHELL` is unset or points nowhere.
const FALLBACK_SHELLS: [&str; 4] = ["/bin/bash", "/usr/bin/zsh", "/bin/zsh", "/bin/sh"];

/// Immutable description of the process to run inside a PTY.
///
/// Built once through the consuming `with_*` methods and never mutated
/// afterwards. Construction does not validate; every spawn attempt runs
/// [`crate::config::ConfigValidator`] again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtyConfig {
    /// Program to execute (looked up on `PATH` when not absolute).
    #[serde(default = "default_shell")]
    command: String,
    /// Arguments passed after the program name.
    #[serde(default)]
    args: Vec<String>,
    /// Extra environment, layered over the inherited environment.
    #[serde(default)]
    env: BTreeMap<String, String>,
    /// Working directory for the child (inherits ours when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    working_dir: Option<PathBuf>,
    /// Default I/O bound in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    timeout_secs: f64,
}

fn default_timeout_secs() -> f64 {
    30.0
}

/// Resolve the user's shell: `$SHELL` if it exists, else the first
/// existing fallback, else `/bin/sh`.
pub fn default_shell() -> String {
    if let Ok(shell) = std::env::var("SHELL") {
        if !shell.is_empty() && Path::new(&shell).exists() {
            return shell;
        }
    }
    FALLBACK_SHELLS
        .iter()
        .find(|candidate| Path::new(candidate).exists())
        .copied()
        .unwrap_or("/bin/sh")
        .to_string()
}

impl PtyConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn timeout_secs(&self) -> f64 {
        self.timeout_secs
    }

    /// Timeout as a `Duration`. Non-positive or non-finite values (which
    /// validation rejects) collapse to zero.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::ZERO)
    }
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self::new(default_shell())
    }
}
