use std::fmt;

/// Where a supervisor is in its process lifecycle.
///
/// ```text
/// Uncreated ─→ Starting ─→ Running ─→ Stopping ─→ Terminated
///     ↑           │           │
///     └───────────┘           └─→ Crashed
/// ```
///
/// `Terminated` and `Crashed` end the current handle; the next `start()`
/// begins again from `Starting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisorState {
    #[default]
    Uncreated,
    Starting,
    Running,
    Stopping,
    Terminated,
    /// The child exited without being asked to.
    Crashed,
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Uncreated => "uncreated",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Stopping => "stopping",
            SupervisorState::Terminated => "terminated",
            SupervisorState::Crashed => "crashed",
        }
    }

    /// True for states that end a handle's life.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupervisorState::Terminated | SupervisorState::Crashed)
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_uncreated() {
        assert_eq!(SupervisorState::default(), SupervisorState::Uncreated);
    }

    #[test]
    fn terminal_states() {
        assert!(SupervisorState::Terminated.is_terminal());
        assert!(SupervisorState::Crashed.is_terminal());
        assert!(!SupervisorState::Running.is_terminal());
        assert!(!SupervisorState::Uncreated.is_terminal());
    }
}
