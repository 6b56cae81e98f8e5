//! Capture channel: the OS-level interception of raw keyboard events
//!
//! A [`CaptureBackend`] owns the platform primitive (a CGEventTap on
//! macOS). The [`CaptureManager`] drives it: creation and teardown,
//! permission failures, and recovery when the OS disables the channel.

#[cfg(test)]
pub(crate) mod fake;
#[cfg(target_os = "macos")]
mod macos;
mod manager;

use std::sync::Arc;

#[cfg(target_os = "macos")]
pub use macos::EventTapBackend;
pub use manager::CaptureManager;

use crate::engine::{Decision, KeyEvent};

/// Why the OS turned the channel off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableReason {
    /// The callback took too long to return
    Timeout,
    /// The user or a security heuristic disabled input interception
    UserInput,
}

/// What the backend hands to the manager for every captured callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapEvent {
    /// A hardware keyboard event
    Key(KeyEvent),
    /// An event this crate posted itself
    Synthetic,
    /// The OS disabled the channel
    Disabled(DisableReason),
}

/// Errors from the capture layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to create event tap - check Input Monitoring permission")]
    PermissionDenied,

    #[error("failed to create run loop source for event tap")]
    RunLoopSource,

    #[error("failed to spawn capture thread: {0}")]
    ThreadSpawn(String),

    #[error("event tap could not be re-enabled")]
    ReenableFailed,

    #[error("keyboard capture is not supported on this platform")]
    Unsupported,
}

/// Control over the live channel, available from inside the callback
pub trait ChannelControl {
    /// Turn the channel back on after the OS disabled it
    fn reenable(&self) -> Result<(), CaptureError>;
}

/// Per-event callback installed by the manager.
///
/// Runs on the capture thread for every event, in delivery order.
pub type TapHandler = Arc<dyn Fn(TapEvent, &dyn ChannelControl) -> Decision + Send + Sync>;

/// A live capture channel registered with its event loop
pub trait CaptureChannel: Send {
    /// Disable, unregister, and release the channel
    fn close(self: Box<Self>);
}

/// Platform primitive that can open capture channels
pub trait CaptureBackend: Send + Sync {
    /// Create the channel, register it with its event loop, and enable it
    fn open(&self, handler: TapHandler) -> Result<Box<dyn CaptureChannel>, CaptureError>;

    /// Ask the OS to prompt the user for input-monitoring access
    fn request_permission(&self);
}
