use std::io;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::io::IoChannel;
use crate::pty::system::{PtyProcess, SpawnedPty};

const REAP_ATTEMPTS: u32 = 20;
const REAP_INTERVAL: Duration = Duration::from_millis(10);

/// Owns the OS side of one spawn: the child and its PTY channel.
///
/// Release happens exactly once, either through [`PtySession::release`]
/// or on drop. Either way a child that may still be running is killed, so
/// a session never lets go of a live process.
pub(crate) struct PtySession {
    process: Box<dyn PtyProcess>,
    io: IoChannel,
    released: bool,
}

impl PtySession {
    pub(crate) fn open(spawned: SpawnedPty) -> io::Result<Self> {
        let SpawnedPty {
            mut process,
            reader,
            writer,
        } = spawned;

        let io = match IoChannel::new(reader, writer) {
            Ok(io) => io,
            Err(err) => {
                // Nothing will own the child; don't leave it running.
                if let Err(kill_err) = process.kill() {
                    warn!(error = %kill_err, "failed to kill child after channel setup error");
                }
                return Err(err);
            }
        };

        Ok(Self {
            process,
            io,
            released: false,
        })
    }

    pub(crate) fn process(&mut self) -> &mut dyn PtyProcess {
        self.process.as_mut()
    }

    pub(crate) fn io(&mut self) -> &mut IoChannel {
        &mut self.io
    }

    /// Kill the child if it may still be running, then close the PTY
    /// channel. Idempotent.
    pub(crate) fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if !matches!(self.process.try_wait(), Ok(Some(_))) {
            warn!(pid = ?self.process.pid(), "child still running at release, killing");
            if let Err(err) = self.process.kill() {
                warn!(error = %err, "failed to kill child on release");
            }
            self.reap();
        }
        self.io.close();
        debug!(pid = ?self.process.pid(), "pty session released");
    }

    fn reap(&mut self) {
        for _ in 0..REAP_ATTEMPTS {
            match self.process.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => thread::sleep(REAP_INTERVAL),
                Err(err) => {
                    warn!(error = %err, "failed to reap child on release");
                    return;
                }
            }
        }
        warn!(pid = ?self.process.pid(), "child not reaped after kill on release");
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.release();
    }
}
