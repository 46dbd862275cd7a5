use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use std::io;
use std::sync::{Arc, Mutex};

type Cleanup = Arc<Mutex<Option<Box<dyn FnOnce() + Send + 'static>>>>;

/// Raw mode on the alternate screen for as long as the guard lives.
///
/// The user's terminal is restored on drop and also from a panic hook, so a
/// panic while a child owns the screen doesn't leave the shell in raw mode.
pub struct FullscreenGuard {
    cleanup: Cleanup,
}

impl FullscreenGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        if let Err(err) = io::stdout().execute(EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err);
        }

        let restore: Box<dyn FnOnce() + Send + 'static> = Box::new(|| {
            let _ = disable_raw_mode();
            let _ = io::stdout().execute(LeaveAlternateScreen);
        });
        let guard = Self {
            cleanup: Arc::new(Mutex::new(Some(restore))),
        };
        guard.install_panic_hook();
        Ok(guard)
    }

    fn install_panic_hook(&self) {
        let cleanup = Arc::clone(&self.cleanup);
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            run_cleanup(&cleanup);
            default_hook(info);
        }));
    }
}

impl Drop for FullscreenGuard {
    fn drop(&mut self) {
        run_cleanup(&self.cleanup);
    }
}

fn run_cleanup(cleanup: &Cleanup) {
    if let Ok(mut slot) = cleanup.lock() {
        if let Some(cleanup) = slot.take() {
            cleanup();
        }
    }
}
