//! hyperkeys: turn one physical key into a "Hyper" modifier
//!
//! Holding the hyper key and pressing another key fires an activation for
//! that key. Tapping it alone replays the key, and tapping it twice fires a
//! double-tap.
//!
//! - [`keys`]: key codes, modifier flags, and the Caps Lock remap
//! - [`engine`]: the tap/hold/double-tap state machine
//! - [`capture`]: the OS-level keyboard capture channel
//! - [`synth`]: synthetic key event posting
//! - [`events`], [`lifecycle`], [`config`]: daemon plumbing

pub mod capture;
pub mod config;
pub mod engine;
pub mod events;
pub mod keys;
pub mod lifecycle;
pub mod synth;
