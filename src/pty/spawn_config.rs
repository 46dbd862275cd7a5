use std::path::PathBuf;

use crate::config::PtyConfig;
use crate::pty::system::TerminalSize;

/// Default `TERM` for children unless the config sets its own.
const DEFAULT_TERM: &str = "xterm-256color";

/// Ready-to-use spawn parameters for a [`crate::pty::PtySystem`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub command: String,
    pub args: Vec<String>,
    /// Layered over the inherited environment, in order.
    pub env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
    pub size: TerminalSize,
}

impl SpawnRequest {
    pub fn from_config(config: &PtyConfig, size: TerminalSize) -> Self {
        let mut env = Vec::with_capacity(config.env().len() + 1);
        if !config.env().contains_key("TERM") {
            env.push(("TERM".to_string(), DEFAULT_TERM.to_string()));
        }
        env.extend(
            config
                .env()
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        Self {
            command: config.command().to_string(),
            args: config.args().to_vec(),
            env,
            working_dir: config.working_dir().map(PathBuf::from),
            size,
        }
    }
}
