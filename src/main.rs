use anyhow::{Context, Result};
use clap::Parser;
use crossterm::terminal::size as terminal_size;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use ptyvisor::logging::init_tracing;
use ptyvisor::terminal::FullscreenGuard;
use ptyvisor::{PtyConfig, ReadMode, Supervisor, SupervisorError};

const READ_CHUNK: usize = 4096;
const READ_SLICE: Duration = Duration::from_millis(50);

/// Run a command on a pseudo-terminal under a supervisor.
#[derive(Debug, Parser)]
#[command(name = "ptyvisor", version, about)]
struct Cli {
    /// Config file (default: the platform config dir's ptyvisor/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop the command after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Working directory for the command
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Extra environment variable, repeatable
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Print the lifecycle event log as JSON lines on exit
    #[arg(long)]
    events: bool,

    /// Run on the alternate screen in raw mode
    #[arg(long)]
    fullscreen: bool,

    /// Command and arguments (default: the configured command)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(&cli)?;
    let timeout = config.timeout();
    let (cols, rows) = terminal_size().unwrap_or((80, 24));
    let mut supervisor = Supervisor::native().with_size(rows, cols);

    let screen = if cli.fullscreen {
        Some(FullscreenGuard::enter().context("failed to enter fullscreen mode")?)
    } else {
        None
    };

    supervisor.start(config)?;
    let pumped = pump(&mut supervisor, timeout);
    supervisor.stop(false)?;
    drop(screen);

    if cli.events {
        supervisor
            .events()
            .write_json_lines(io::stdout().lock())
            .context("failed to write event log")?;
    }
    pumped?;

    let code = supervisor.exit_status().unwrap_or(0);
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

fn load_config(cli: &Cli) -> Result<PtyConfig> {
    let base = match &cli.config {
        Some(path) => PtyConfig::load_from(path)?,
        None => PtyConfig::load()?,
    };

    let mut overrides = toml::Table::new();
    if let Some((command, args)) = cli.command.split_first() {
        overrides.insert("command".into(), toml::Value::String(command.clone()));
        overrides.insert(
            "args".into(),
            toml::Value::Array(args.iter().cloned().map(toml::Value::String).collect()),
        );
    }
    if let Some(dir) = &cli.cwd {
        overrides.insert(
            "working_dir".into(),
            toml::Value::String(dir.to_string_lossy().into_owned()),
        );
    }
    if let Some(secs) = cli.timeout {
        overrides.insert("timeout_secs".into(), toml::Value::Float(secs));
    }

    let config = cli
        .env
        .iter()
        .fold(base.merged(&overrides)?, |config, (key, value)| {
            config.with_env(key.as_str(), value.as_str())
        });
    Ok(config.validated()?)
}

/// Copy child output to stdout and our stdin to the child until the child
/// exits or `timeout` elapses.
fn pump(supervisor: &mut Supervisor, timeout: Duration) -> Result<()> {
    let resized = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    signal_hook::flag::register(
        signal_hook::consts::signal::SIGWINCH,
        Arc::clone(&resized),
    )?;

    let mut input = Some(forward_stdin());
    let deadline = Instant::now() + timeout;
    let mut stdout = io::stdout();

    loop {
        if resized.swap(false, Ordering::Relaxed) {
            if let Ok((cols, rows)) = terminal_size() {
                supervisor.resize(rows, cols)?;
            }
        }

        let stdin_open = match &input {
            Some(rx) => drain_input(rx, supervisor)?,
            None => true,
        };
        if !stdin_open {
            input = None;
            // Our stdin closed; pass the EOF on.
            ignore_not_running(supervisor.send_eof())?;
        }

        let text = supervisor.read_text(READ_CHUNK, ReadMode::Timeout(READ_SLICE))?;
        if !text.is_empty() {
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        } else if !supervisor.is_alive() {
            return Ok(());
        }

        if Instant::now() >= deadline {
            warn!(timeout_secs = timeout.as_secs_f64(), "timeout elapsed, stopping");
            return Ok(());
        }
    }
}

/// Forward pending stdin bytes. `Ok(false)` once stdin has closed.
fn drain_input(rx: &Receiver<Vec<u8>>, supervisor: &mut Supervisor) -> Result<bool> {
    loop {
        match rx.try_recv() {
            Ok(bytes) => ignore_not_running(supervisor.write(&bytes).map(|_| ()))?,
            Err(TryRecvError::Empty) => return Ok(true),
            Err(TryRecvError::Disconnected) => return Ok(false),
        }
    }
}

fn ignore_not_running(result: Result<(), SupervisorError>) -> Result<()> {
    match result {
        Err(SupervisorError::NotRunning) => {
            debug!("input dropped, process not running");
            Ok(())
        }
        other => Ok(other?),
    }
}

fn forward_stdin() -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buffer = [0u8; 1024];
        loop {
            let count = match stdin.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(count) => count,
            };
            if tx.send(buffer[..count].to_vec()).is_err() {
                break;
            }
        }
    });
    rx
}
