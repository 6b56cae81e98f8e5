//! Key definitions shared by the engine, the emitter, and the capture layer
//!
//! Provides the symbolic key table, modifier flag state, and the
//! Caps Lock hardware remap helper.

mod code;
pub mod hidutil;
mod modifiers;

pub use code::{KeyCode, ParseKeyError};
pub use modifiers::{flags, Modifiers};
