//! Application-level notifications
//!
//! The engine callbacks run on the capture thread and must return quickly,
//! so they only translate into an [`AppEvent`] and hand it to the async
//! side of the daemon.

use serde::{Deserialize, Serialize};

use crate::keys::KeyCode;

/// Events delivered from the capture thread to the application layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// Hyper key held and `key` pressed
    Activated {
        /// The combo key
        key: KeyCode,
    },

    /// Hyper key tapped twice in quick succession
    DoubleTap,

    /// Input monitoring permission became required or was granted
    PermissionChanged {
        needs_permission: bool,
    },
}

impl std::fmt::Display for AppEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppEvent::Activated { key } => write!(f, "ACTIVATED ({})", key.name()),
            AppEvent::DoubleTap => write!(f, "DOUBLE_TAP"),
            AppEvent::PermissionChanged { needs_permission } => {
                write!(f, "PERMISSION_CHANGED (needs_permission={})", needs_permission)
            }
        }
    }
}
