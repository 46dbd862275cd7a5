//! Supervise child processes attached to pseudo-terminals.
//!
//! A [`Supervisor`] validates a [`PtyConfig`], spawns the command on a PTY,
//! serves byte and text I/O against it, and records each lifecycle step as a
//! [`ProcessEvent`] whose history can be folded back into state.

pub mod config;
pub mod effect;
pub mod events;
pub mod io;
pub mod logging;
pub mod pty;
pub mod supervisor;
pub mod terminal;

pub use config::{ConfigError, ConfigValidator, PtyConfig};
pub use effect::Effect;
pub use events::{EventStore, ProcessEvent, ProcessEventKind, ProcessState, ProcessStateData};
pub use io::ReadMode;
pub use pty::{PtyHandle, TerminalSize};
pub use supervisor::{Supervisor, SupervisorError, SupervisorState};
