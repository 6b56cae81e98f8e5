//! Modifier key state carried on captured and synthetic events
//!
//! Bit positions follow the macOS CGEventFlags layout so the state can be
//! read from and written back to CoreGraphics events unchanged.

/// Modifier flag masks in the CGEventFlags layout
pub mod flags {
    /// Shift key modifier flag
    pub const SHIFT: u64 = 1 << 17;
    /// Control key modifier flag
    pub const CONTROL: u64 = 1 << 18;
    /// Option/Alt key modifier flag
    pub const OPTION: u64 = 1 << 19;
    /// Command key modifier flag
    pub const COMMAND: u64 = 1 << 20;
}

/// Tracks which modifier keys are held for an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift key is held
    pub shift: bool,
    /// Control key is held
    pub control: bool,
    /// Option/Alt key is held
    pub option: bool,
    /// Command key is held
    pub command: bool,
}

impl Modifiers {
    /// No modifiers held
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        control: false,
        option: false,
        command: false,
    };

    /// Read modifier state from raw CGEventFlags bits
    pub fn from_bits(bits: u64) -> Self {
        Self {
            shift: bits & flags::SHIFT != 0,
            control: bits & flags::CONTROL != 0,
            option: bits & flags::OPTION != 0,
            command: bits & flags::COMMAND != 0,
        }
    }

    /// Encode as CGEventFlags bits
    pub fn bits(&self) -> u64 {
        let mut bits = 0;
        if self.shift {
            bits |= flags::SHIFT;
        }
        if self.control {
            bits |= flags::CONTROL;
        }
        if self.option {
            bits |= flags::OPTION;
        }
        if self.command {
            bits |= flags::COMMAND;
        }
        bits
    }

    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.control && !self.option && !self.command
    }
}
