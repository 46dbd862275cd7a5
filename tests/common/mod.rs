//! Shared test utilities and mock PTY infrastructure.

#![allow(dead_code, unused_imports)]

use parking_lot::Mutex;
use ptyvisor::pty::{PtyProcess, PtySystem, SpawnRequest, SpawnedPty, TerminalSize};
use ptyvisor::{ReadMode, Supervisor};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type SpyBuffer = Arc<Mutex<Vec<u8>>>;

const SIGKILL: i32 = 9;
const SIGTERM: i32 = 15;

/// Exit codes the mock reports, shell style.
pub const EXIT_ON_SIGTERM: u32 = 143;
pub const EXIT_ON_SIGKILL: u32 = 137;

/// Counts of every OS-level call the supervisor makes.
#[derive(Debug, Default)]
pub struct Calls {
    pub spawn: AtomicUsize,
    pub try_wait: AtomicUsize,
    pub signal: AtomicUsize,
    pub kill: AtomicUsize,
    pub resize: AtomicUsize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.spawn.load(Ordering::SeqCst)
            + self.try_wait.load(Ordering::SeqCst)
            + self.signal.load(Ordering::SeqCst)
            + self.kill.load(Ordering::SeqCst)
            + self.resize.load(Ordering::SeqCst)
    }
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// State shared between the mock system and the process it last spawned.
#[derive(Default)]
struct Child {
    exit: Mutex<Option<u32>>,
    output: Mutex<Option<Sender<Vec<u8>>>>,
}

impl Child {
    fn exit_with(&self, code: u32) {
        let mut exit = self.exit.lock();
        if exit.is_none() {
            *exit = Some(code);
        }
        // Closing the sender ends the reader, as a hangup would.
        self.output.lock().take();
    }
}

/// In-memory [`PtySystem`] that records every call.
#[derive(Default)]
pub struct MockPtySystem {
    pub calls: Arc<Calls>,
    pub written: SpyBuffer,
    pub signals: Arc<Mutex<Vec<i32>>>,
    pub sizes: Arc<Mutex<Vec<TerminalSize>>>,
    pub requests: Mutex<Vec<SpawnRequest>>,
    fail_spawn: AtomicBool,
    ignore_sigterm: AtomicBool,
    fail_signals: AtomicBool,
    fail_try_wait: AtomicBool,
    next_pid: AtomicU32,
    current: Mutex<Option<Arc<Child>>>,
}

impl MockPtySystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_pid: AtomicU32::new(1000),
            ..Self::default()
        })
    }

    pub fn fail_spawn(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    /// Children spawned from now on survive SIGTERM.
    pub fn ignore_sigterm(&self, ignore: bool) {
        self.ignore_sigterm.store(ignore, Ordering::SeqCst);
    }

    /// Children spawned from now on reject every signal with EPERM.
    pub fn fail_signals(&self, fail: bool) {
        self.fail_signals.store(fail, Ordering::SeqCst);
    }

    /// Children spawned from now on can't report their exit status.
    pub fn fail_try_wait(&self, fail: bool) {
        self.fail_try_wait.store(fail, Ordering::SeqCst);
    }

    /// Exit code of the last spawned child, `None` while it runs.
    pub fn current_exit(&self) -> Option<u32> {
        self.current
            .lock()
            .as_ref()
            .and_then(|child| *child.exit.lock())
    }

    /// Make the current child produce output.
    pub fn emit(&self, bytes: &[u8]) {
        if let Some(child) = self.current.lock().as_ref() {
            if let Some(tx) = child.output.lock().as_ref() {
                let _ = tx.send(bytes.to_vec());
            }
        }
    }

    /// Make the current child exit by itself.
    pub fn exit_current(&self, code: u32) {
        if let Some(child) = self.current.lock().as_ref() {
            child.exit_with(code);
        }
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written.lock()).into_owned()
    }
}

impl PtySystem for MockPtySystem {
    fn spawn(&self, request: &SpawnRequest) -> anyhow::Result<SpawnedPty> {
        self.calls.spawn.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if self.fail_spawn.load(Ordering::SeqCst) {
            anyhow::bail!("No such file or directory: {}", request.command);
        }

        let (tx, rx) = mpsc::channel();
        let child = Arc::new(Child::default());
        *child.output.lock() = Some(tx);
        *self.current.lock() = Some(Arc::clone(&child));

        let process = MockProcess {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            child,
            ignore_sigterm: self.ignore_sigterm.load(Ordering::SeqCst),
            fail_signals: self.fail_signals.load(Ordering::SeqCst),
            fail_try_wait: self.fail_try_wait.load(Ordering::SeqCst),
            calls: Arc::clone(&self.calls),
            signals: Arc::clone(&self.signals),
            sizes: Arc::clone(&self.sizes),
        };

        Ok(SpawnedPty {
            process: Box::new(process),
            reader: Box::new(MockReader {
                rx,
                pending: Vec::new(),
            }),
            writer: Box::new(SpyWriter {
                buffer: Arc::clone(&self.written),
            }),
        })
    }
}

struct MockProcess {
    pid: u32,
    child: Arc<Child>,
    ignore_sigterm: bool,
    fail_signals: bool,
    fail_try_wait: bool,
    calls: Arc<Calls>,
    signals: Arc<Mutex<Vec<i32>>>,
    sizes: Arc<Mutex<Vec<TerminalSize>>>,
}

impl PtyProcess for MockProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn raw_fd(&self) -> Option<i32> {
        None
    }

    fn try_wait(&mut self) -> io::Result<Option<u32>> {
        self.calls.try_wait.fetch_add(1, Ordering::SeqCst);
        if self.fail_try_wait {
            return Err(io::Error::other("waitpid failed"));
        }
        Ok(*self.child.exit.lock())
    }

    fn signal(&mut self, signal: i32) -> io::Result<()> {
        self.calls.signal.fetch_add(1, Ordering::SeqCst);
        if self.fail_signals {
            return Err(io::Error::from_raw_os_error(libc::EPERM));
        }
        self.signals.lock().push(signal);
        match signal {
            SIGTERM if !self.ignore_sigterm => self.child.exit_with(EXIT_ON_SIGTERM),
            SIGKILL => self.child.exit_with(EXIT_ON_SIGKILL),
            _ => {}
        }
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.calls.kill.fetch_add(1, Ordering::SeqCst);
        self.child.exit_with(EXIT_ON_SIGKILL);
        Ok(())
    }

    fn resize(&self, size: TerminalSize) -> io::Result<()> {
        self.calls.resize.fetch_add(1, Ordering::SeqCst);
        self.sizes.lock().push(size);
        Ok(())
    }
}

struct MockReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(bytes) => self.pending = bytes,
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

/// Writer that appends everything into a shared buffer.
pub struct SpyWriter {
    buffer: SpyBuffer,
}

impl Write for SpyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read until `needle` shows up or `timeout` passes; returns all text read.
pub fn read_until(supervisor: &mut Supervisor, needle: &str, timeout: Duration) -> String {
    let deadline = Instant::now() + timeout;
    let mut text = String::new();
    while Instant::now() < deadline && !text.contains(needle) {
        match supervisor.read_text(4096, ReadMode::Timeout(Duration::from_millis(50))) {
            Ok(chunk) => text.push_str(&chunk),
            Err(_) => break,
        }
    }
    text
}
