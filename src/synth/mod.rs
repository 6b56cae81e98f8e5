//! Synthetic key events
//!
//! Replays the hyper key's own character when a press turns out to have
//! been a tap. Every event the emitter posts carries [`SYNTHETIC_EVENT_TAG`]
//! so the capture channel can recognise it and let it through untouched.

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "macos")]
pub use macos::CgEmitter;

use crate::keys::Modifiers;

/// Value written to the event's source user-data field on every posted event
pub const SYNTHETIC_EVENT_TAG: i64 = 0x4859_5045_524B_4559; // "HYPERKEY"

/// Errors raised while building or posting a synthetic event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("failed to create event source")]
    EventSource,

    #[error("failed to create keyboard event for key code {0}")]
    EventCreate(u16),
}

/// Injects keyboard events into the OS input stream
pub trait KeyEmitter: Send + Sync {
    /// Post a key-down for `code`
    fn post_key_down(&self, code: u16, modifiers: Modifiers) -> Result<(), EmitError>;

    /// Post a key-up for `code`
    fn post_key_up(&self, code: u16, modifiers: Modifiers) -> Result<(), EmitError>;

    /// Post a full press: key-down followed by key-up
    fn post_key_press(&self, code: u16, modifiers: Modifiers) -> Result<(), EmitError> {
        self.post_key_down(code, modifiers)?;
        self.post_key_up(code, modifiers)
    }
}
