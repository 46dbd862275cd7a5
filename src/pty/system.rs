//! Seam between the supervisor and the OS.
//!
//! Everything that touches a real process or PTY goes through
//! [`PtySystem`] and [`PtyProcess`], so lifecycle logic can be tested with
//! in-memory fakes.

use portable_pty::PtySize;
use std::io::{self, Read, Write};

use crate::pty::spawn_config::SpawnRequest;

/// Terminal geometry in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
}

impl TerminalSize {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

impl From<TerminalSize> for PtySize {
    fn from(size: TerminalSize) -> Self {
        PtySize {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

/// Everything produced by one successful spawn.
pub struct SpawnedPty {
    pub process: Box<dyn PtyProcess>,
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
}

/// Creates processes attached to a fresh PTY.
pub trait PtySystem: Send + Sync {
    fn spawn(&self, request: &SpawnRequest) -> anyhow::Result<SpawnedPty>;
}

/// A running (or exited, not yet released) child on a PTY.
pub trait PtyProcess: Send {
    fn pid(&self) -> Option<u32>;

    /// Raw master descriptor, where the platform has one.
    fn raw_fd(&self) -> Option<i32>;

    /// `Some(exit_code)` once the child has exited. Reaps it.
    fn try_wait(&mut self) -> io::Result<Option<u32>>;

    /// Deliver a signal number to the child.
    fn signal(&mut self, signal: i32) -> io::Result<()>;

    /// Kill the child immediately.
    fn kill(&mut self) -> io::Result<()>;

    fn resize(&self, size: TerminalSize) -> io::Result<()>;
}
