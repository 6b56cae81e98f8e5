//! Input events and per-event decisions

use std::time::Instant;

use crate::keys::Modifiers;

/// The kind of keyboard transition an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
    /// A modifier key changed state
    FlagsChanged,
}

/// A raw keyboard event as delivered by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    /// macOS virtual key code
    pub raw_code: u16,
    pub is_auto_repeat: bool,
    /// Monotonic time the transition was observed
    pub timestamp: Instant,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(kind: KeyEventKind, raw_code: u16, timestamp: Instant) -> Self {
        Self {
            kind,
            raw_code,
            is_auto_repeat: false,
            timestamp,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn key_down(raw_code: u16, timestamp: Instant) -> Self {
        Self::new(KeyEventKind::KeyDown, raw_code, timestamp)
    }

    pub fn key_up(raw_code: u16, timestamp: Instant) -> Self {
        Self::new(KeyEventKind::KeyUp, raw_code, timestamp)
    }

    pub fn flags_changed(raw_code: u16, modifiers: Modifiers, timestamp: Instant) -> Self {
        Self::new(KeyEventKind::FlagsChanged, raw_code, timestamp).with_modifiers(modifiers)
    }

    /// Mark the event as an OS auto-repeat
    pub fn repeat(mut self) -> Self {
        self.is_auto_repeat = true;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// What the capture channel should do with the event it handed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Deliver the event unchanged
    PassThrough,
    /// Drop the event before any other application sees it
    Suppress,
}
