mod handle;
mod native;
mod session;
mod spawn_config;
mod system;

pub use handle::PtyHandle;
pub use native::NativePtySystem;
pub(crate) use session::PtySession;
pub use spawn_config::SpawnRequest;
pub use system::{PtyProcess, PtySystem, SpawnedPty, TerminalSize};
