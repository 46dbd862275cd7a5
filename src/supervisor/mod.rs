//! Lifecycle owner for one PTY-attached child process at a time.
//!
//! The supervisor validates config, spawns through a [`PtySystem`], holds
//! the resulting session, and records every transition in an
//! [`EventStore`]. The log outlives each process, so a stopped process'
//! history stays queryable.

mod error;
mod state;

pub use error::SupervisorError;
pub use state::SupervisorState;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::PtyConfig;
use crate::effect::Effect;
use crate::events::{EventStore, ProcessEvent, ProcessEventKind, ProcessStateData};
use crate::io::ReadMode;
use crate::pty::{
    NativePtySystem, PtyHandle, PtyProcess, PtySession, PtySystem, SpawnRequest, SpawnedPty,
    TerminalSize,
};

/// How many times a graceful stop checks for exit after SIGTERM.
pub const STOP_POLL_ATTEMPTS: u32 = 10;

/// Delay between exit checks during a graceful stop.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

const REAP_ATTEMPTS: u32 = 50;
const REAP_INTERVAL: Duration = Duration::from_millis(10);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;

/// Bounds on how long a graceful stop waits before escalating to SIGKILL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            attempts: STOP_POLL_ATTEMPTS,
            interval: STOP_POLL_INTERVAL,
        }
    }
}

/// Outcome of bringing a live child down.
struct Termination {
    exit_code: Option<u32>,
    escalated: bool,
}

/// Owns at most one live child and the event log of every child it ran.
///
/// Every mutating operation takes `&mut self`; callers serialise access.
pub struct Supervisor {
    system: Arc<dyn PtySystem>,
    state: SupervisorState,
    session: Option<PtySession>,
    handle: Option<PtyHandle>,
    /// Last config that started successfully; reused by `restart`.
    config: Option<PtyConfig>,
    size: TerminalSize,
    exit_code: Option<u32>,
    events: EventStore,
    stop_policy: StopPolicy,
}

impl Supervisor {
    pub fn new(system: Arc<dyn PtySystem>) -> Self {
        Self {
            system,
            state: SupervisorState::Uncreated,
            session: None,
            handle: None,
            config: None,
            size: TerminalSize::default(),
            exit_code: None,
            events: EventStore::new(),
            stop_policy: StopPolicy::default(),
        }
    }

    /// A supervisor backed by real OS PTYs.
    pub fn native() -> Self {
        Self::new(Arc::new(NativePtySystem))
    }

    /// Geometry for the next spawn.
    pub fn with_size(mut self, rows: u16, cols: u16) -> Self {
        self.size = TerminalSize::new(rows, cols);
        self
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.stop_policy = policy;
        self
    }

    /// The spawn step as a deferred effect. Nothing happens until it runs.
    pub fn spawn_effect(&self, config: &PtyConfig) -> Effect<SpawnedPty, SupervisorError> {
        let system = Arc::clone(&self.system);
        let request = SpawnRequest::from_config(config, self.size);
        Effect::from_fn(move || {
            system
                .spawn(&request)
                .map_err(|err| SupervisorError::Spawn {
                    command: request.command.clone(),
                    reason: format!("{err:#}"),
                })
        })
    }

    /// Validate `config` and spawn it on a fresh PTY.
    pub fn start(&mut self, config: PtyConfig) -> Result<PtyHandle, SupervisorError> {
        let config = config.validated()?;

        if self.is_alive() {
            let pid = self.current_pid().unwrap_or_default();
            return Err(SupervisorError::AlreadyRunning { pid });
        }

        // Leftover from a child that exited on its own.
        if let Some(mut stale) = self.session.take() {
            stale.release();
        }
        self.handle = None;
        self.exit_code = None;

        self.transition(SupervisorState::Starting);

        let spawned = match self.spawn_effect(&config).run() {
            Ok(spawned) => spawned,
            Err(err) => {
                warn!(command = %config.command(), error = %err, "spawn failed");
                self.transition(SupervisorState::Uncreated);
                return Err(err);
            }
        };

        let mut session = match PtySession::open(spawned) {
            Ok(session) => session,
            Err(err) => {
                self.transition(SupervisorState::Uncreated);
                return Err(err.into());
            }
        };

        let Some(pid) = session.process().pid() else {
            // Dropping the unreleased session kills the child.
            drop(session);
            self.transition(SupervisorState::Uncreated);
            return Err(SupervisorError::Spawn {
                command: config.command().to_string(),
                reason: "spawned process has no pid".to_string(),
            });
        };

        let handle = PtyHandle::new(pid, session.process().raw_fd(), config.clone());
        // Pids get reused; the handle id tells two runs under one pid apart.
        let started = self
            .event(ProcessEventKind::Started, pid)
            .with_payload("handle_id", handle.id().to_string())
            .with_payload("command", config.command())
            .with_payload("args", config.args().to_vec());
        if let Err(err) = self.events.append(started) {
            drop(session);
            self.transition(SupervisorState::Uncreated);
            return Err(err.into());
        }

        info!(
            pid,
            command = %config.command(),
            rows = self.size.rows,
            cols = self.size.cols,
            "process started"
        );

        self.session = Some(session);
        self.handle = Some(handle.clone());
        self.config = Some(config);
        self.transition(SupervisorState::Running);
        Ok(handle)
    }

    /// Bring the process down and release its PTY.
    ///
    /// Without `force`, sends SIGTERM and polls for exit before escalating
    /// to SIGKILL. A failed SIGTERM or exit check also escalates. Teardown
    /// problems are logged, never returned: on return the supervisor is
    /// `Terminated` and the session is released. A no-op when nothing was
    /// started.
    pub fn stop(&mut self, force: bool) -> Result<(), SupervisorError> {
        let Some(session) = self.session.take() else {
            debug!(state = %self.state, "stop requested with no session");
            return Ok(());
        };
        let mut session = scopeguard::guard(session, |mut session| session.release());
        let pid = self.current_pid();

        if self.state != SupervisorState::Crashed {
            self.transition(SupervisorState::Stopping);
            if let Some(pid) = pid {
                let stopping = self
                    .event(ProcessEventKind::Stopping, pid)
                    .with_payload("force", force);
                self.record_or_warn(stopping);
            }

            match terminate(session.process(), force, self.stop_policy) {
                Ok(outcome) => {
                    if outcome.exit_code.is_some() {
                        self.exit_code = outcome.exit_code;
                    }
                    if let Some(pid) = pid {
                        let stopped = self
                            .event(ProcessEventKind::Stopped, pid)
                            .with_payload("escalated", outcome.escalated)
                            .with_payload("exit_code", outcome.exit_code);
                        self.record_or_warn(stopped);
                    }
                }
                Err(err) => warn!(?pid, error = %err, "failed to stop process cleanly"),
            }

            if let Some(pid) = pid {
                let terminated = self
                    .event(ProcessEventKind::Terminated, pid)
                    .with_payload("reason", "stopped");
                self.record_or_warn(terminated);
            }
        }

        drop(session);
        self.handle = None;
        self.transition(SupervisorState::Terminated);
        info!(?pid, exit_code = ?self.exit_code, "process stopped");
        Ok(())
    }

    /// Stop gracefully, then start again with the last config.
    pub fn restart(&mut self) -> Result<PtyHandle, SupervisorError> {
        let config = self.config.clone().ok_or(SupervisorError::NotRunning)?;
        self.stop(false)?;
        match self.start(config) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                self.transition(SupervisorState::Uncreated);
                Err(err)
            }
        }
    }

    /// Check on the child. Notices an unexpected exit and records it.
    pub fn is_alive(&mut self) -> bool {
        if self.state != SupervisorState::Running {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.process().try_wait() {
            Ok(None) => true,
            Ok(Some(code)) => {
                self.on_exit(Some(code));
                false
            }
            Err(err) => {
                warn!(pid = ?self.current_pid(), error = %err, "liveness check failed");
                self.on_exit(None);
                false
            }
        }
    }

    /// Deliver `signal` to the live process. Ok and no-op if none.
    pub fn send_signal(&mut self, signal: i32) -> Result<(), SupervisorError> {
        if !self.is_alive() {
            debug!(signal, "signal skipped, process not alive");
            return Ok(());
        }
        let session = self.session.as_mut().ok_or(SupervisorError::NotRunning)?;
        session.process().signal(signal)?;

        let pid = self.current_pid().unwrap_or_default();
        info!(pid, signal, "signal delivered");
        let signaled = self
            .event(ProcessEventKind::Signaled, pid)
            .with_payload("signal", signal);
        self.events.append(signaled)?;
        Ok(())
    }

    /// Set the terminal geometry. Applied now if the process is alive,
    /// otherwise used by the next `start`.
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<(), SupervisorError> {
        self.size = TerminalSize::new(rows, cols);
        if !self.is_alive() {
            debug!(rows, cols, "resize cached for next start");
            return Ok(());
        }
        let session = self.session.as_mut().ok_or(SupervisorError::NotRunning)?;
        session.process().resize(self.size)?;

        let pid = self.current_pid().unwrap_or_default();
        debug!(pid, rows, cols, "pty resized");
        let resized = self
            .event(ProcessEventKind::Resized, pid)
            .with_payload("rows", rows)
            .with_payload("cols", cols);
        self.events.append(resized)?;
        Ok(())
    }

    /// Send every byte of `bytes` to the child.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, SupervisorError> {
        if !self.is_alive() {
            return Err(SupervisorError::NotRunning);
        }
        let session = self.session.as_mut().ok_or(SupervisorError::NotRunning)?;
        Ok(session.io().write_all(bytes)?)
    }

    pub fn write_text(&mut self, text: &str) -> Result<usize, SupervisorError> {
        self.write(&crate::io::encode(text))
    }

    pub fn send_ctrl_c(&mut self) -> Result<(), SupervisorError> {
        self.write(&[CTRL_C]).map(|_| ())
    }

    pub fn send_eof(&mut self) -> Result<(), SupervisorError> {
        self.write(&[CTRL_D]).map(|_| ())
    }

    /// Read child output. Still works after the child exits, until `stop`.
    pub fn read(&mut self, max_bytes: usize, mode: ReadMode) -> Result<Vec<u8>, SupervisorError> {
        let session = self.session.as_mut().ok_or(SupervisorError::NotRunning)?;
        Ok(session.io().read(max_bytes, mode)?)
    }

    pub fn read_text(&mut self, max_bytes: usize, mode: ReadMode) -> Result<String, SupervisorError> {
        let session = self.session.as_mut().ok_or(SupervisorError::NotRunning)?;
        Ok(session.io().read_text(max_bytes, mode)?)
    }

    /// Poll until the child exits or `timeout` elapses. True if it exited
    /// (or nothing is running).
    pub fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_alive() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Exit code of the last process, once known.
    pub fn exit_status(&self) -> Option<u32> {
        self.exit_code
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn handle(&self) -> Option<&PtyHandle> {
        self.handle.as_ref()
    }

    pub fn size(&self) -> TerminalSize {
        self.size
    }

    pub fn events(&self) -> &EventStore {
        &self.events
    }

    /// Folded state of the current process, or of the last one seen.
    pub fn process_state(&self) -> Option<ProcessStateData> {
        self.current_pid()
            .or_else(|| self.events.latest_process_id())
            .and_then(|pid| self.events.state_for(pid))
    }

    fn current_pid(&self) -> Option<u32> {
        self.handle.as_ref().map(PtyHandle::process_id)
    }

    fn event(&self, kind: ProcessEventKind, pid: u32) -> ProcessEvent {
        ProcessEvent::at(kind, pid, self.events.next_timestamp(pid))
    }

    fn record_or_warn(&mut self, event: ProcessEvent) {
        if let Err(err) = self.events.append(event) {
            warn!(error = %err, "dropping process event");
        }
    }

    fn on_exit(&mut self, exit_code: Option<u32>) {
        self.exit_code = exit_code;
        if let Some(pid) = self.current_pid() {
            info!(pid, ?exit_code, "process exited on its own");
            let terminated = self
                .event(ProcessEventKind::Terminated, pid)
                .with_payload("reason", "exited")
                .with_payload("exit_code", exit_code);
            self.record_or_warn(terminated);
        }
        self.transition(SupervisorState::Crashed);
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "supervisor state change");
            self.state = next;
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(err) = self.stop(true) {
                warn!(error = %err, "failed to stop process on drop");
            }
        }
    }
}

fn terminate(
    process: &mut dyn PtyProcess,
    force: bool,
    policy: StopPolicy,
) -> std::io::Result<Termination> {
    match wait_for_graceful_exit(process, force, policy) {
        Ok(Some(code)) => {
            return Ok(Termination {
                exit_code: Some(code),
                escalated: false,
            })
        }
        Ok(None) if force => {}
        Ok(None) => info!(pid = ?process.pid(), "process ignored SIGTERM, sending SIGKILL"),
        Err(err) => {
            warn!(pid = ?process.pid(), error = %err, "graceful stop failed, sending SIGKILL")
        }
    }

    process.kill()?;
    let exit_code = reap(process)?;
    Ok(Termination {
        exit_code,
        escalated: !force,
    })
}

/// Exit code if the child is already gone or, unless `force`, goes after
/// SIGTERM within `policy`. `Ok(None)` means SIGKILL is still needed.
fn wait_for_graceful_exit(
    process: &mut dyn PtyProcess,
    force: bool,
    policy: StopPolicy,
) -> std::io::Result<Option<u32>> {
    if let Some(code) = process.try_wait()? {
        return Ok(Some(code));
    }
    if force {
        return Ok(None);
    }

    process.signal(signal_hook::consts::signal::SIGTERM)?;
    for _ in 0..policy.attempts {
        thread::sleep(policy.interval);
        if let Some(code) = process.try_wait()? {
            return Ok(Some(code));
        }
    }
    Ok(None)
}

fn reap(process: &mut dyn PtyProcess) -> std::io::Result<Option<u32>> {
    for _ in 0..REAP_ATTEMPTS {
        if let Some(code) = process.try_wait()? {
            return Ok(Some(code));
        }
        thread::sleep(REAP_INTERVAL);
    }
    warn!(pid = ?process.pid(), "process not reaped after SIGKILL");
    Ok(None)
}
