mod loader;
mod types;
mod validator;

pub use loader::ConfigError;
pub use types::{default_shell, PtyConfig};
pub use validator::ConfigValidator;
