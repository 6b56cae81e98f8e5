//! Hyper key engine
//!
//! Consumes raw key events one at a time and decides, per event, whether
//! the OS should deliver or drop it:
//! - Idle: normal typing passes through
//! - PotentialHyper: hyper key is down, tap or hold still undecided
//! - HyperActive: hyper key held as a modifier, combos fire callbacks
//! - WaitingForDoubleTap: a tap finished, replay deferred for a second tap
//! - PotentialDoubleTap: second press is down

mod event;
mod hyper;
mod machine;
mod timer;

#[cfg(test)]
mod proptests;

pub use event::{Decision, KeyEvent, KeyEventKind};
pub use hyper::{ActivateFn, DoubleTapFn, Handlers, HyperKeyEngine};
pub use machine::{State, Timing, DOUBLE_TAP_TIMEOUT, TAP_TIMEOUT};
pub use timer::{Cancel, Scheduler, TimerHandle, TimerTask, TokioScheduler};

#[cfg(test)]
pub(crate) use hyper::harness;
