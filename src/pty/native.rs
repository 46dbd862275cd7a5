use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty};
use std::io;

use crate::pty::spawn_config::SpawnRequest;
use crate::pty::system::{PtyProcess, PtySystem, SpawnedPty, TerminalSize};

/// Real PTYs via `portable-pty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePtySystem;

impl PtySystem for NativePtySystem {
    fn spawn(&self, request: &SpawnRequest) -> anyhow::Result<SpawnedPty> {
        let pty_system = native_pty_system();
        let pair = pty_system.openpty(request.size.into())?;

        let mut cmd = CommandBuilder::new(&request.command);
        cmd.args(&request.args);
        for (key, value) in &request.env {
            cmd.env(key, value);
        }
        match &request.working_dir {
            Some(dir) => cmd.cwd(dir),
            None => cmd.cwd(std::env::current_dir()?),
        }

        let child = pair.slave.spawn_command(cmd)?;
        drop(pair.slave);

        let reader = pair.master.try_clone_reader()?;
        let writer = pair.master.take_writer()?;

        Ok(SpawnedPty {
            process: Box::new(NativeProcess {
                master: pair.master,
                child,
            }),
            reader,
            writer,
        })
    }
}

struct NativeProcess {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
}

impl PtyProcess for NativeProcess {
    fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    fn raw_fd(&self) -> Option<i32> {
        #[cfg(unix)]
        {
            self.master.as_raw_fd()
        }
        #[cfg(not(unix))]
        {
            None
        }
    }

    fn try_wait(&mut self) -> io::Result<Option<u32>> {
        Ok(self.child.try_wait()?.map(|status| status.exit_code()))
    }

    fn signal(&mut self, signal: i32) -> io::Result<()> {
        #[cfg(unix)]
        {
            let pid = self
                .pid()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "child has no pid"))?;
            let pid = libc::pid_t::try_from(pid)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
            // Safety: kill(2) has no memory-safety preconditions.
            if unsafe { libc::kill(pid, signal) } == 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        }
        #[cfg(not(unix))]
        {
            let _ = signal;
            self.child.kill()
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            self.signal(signal_hook::consts::signal::SIGKILL)
        }
        #[cfg(not(unix))]
        {
            self.child.kill()
        }
    }

    fn resize(&self, size: TerminalSize) -> io::Result<()> {
        self.master
            .resize(size.into())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}
