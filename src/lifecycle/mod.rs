//! Daemon lifecycle: shutdown signals and permission retry

mod retry;
mod shutdown;

pub use retry::PermissionRetry;
pub use shutdown::ShutdownSignal;
