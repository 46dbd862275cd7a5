use thiserror::Error;

use crate::config::ConfigError;
use crate::events::OrderingError;

/// Errors returned by [`crate::supervisor::Supervisor`] operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Invalid config; nothing was attempted.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The OS refused to create the process.
    #[error("Failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("Process is not running")]
    NotRunning,

    #[error("Process already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("PTY I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Event log rejected an event: {0}")]
    Ordering(#[from] OrderingError),
}

impl SupervisorError {
    /// Short machine-readable name for logs and CLI output.
    pub fn error_type(&self) -> &'static str {
        match self {
            SupervisorError::Configuration(_) => "configuration_error",
            SupervisorError::Spawn { .. } => "spawn_error",
            SupervisorError::NotRunning => "not_running",
            SupervisorError::AlreadyRunning { .. } => "already_running",
            SupervisorError::Io(_) => "io_error",
            SupervisorError::Ordering(_) => "ordering_error",
        }
    }
}
