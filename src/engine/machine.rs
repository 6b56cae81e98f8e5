//! Tap / hold / double-tap transition table
//!
//! Pure functions only: given the current state and one event, compute the
//! next state, the decision for the OS, and at most one side effect. The
//! engine applies the result, owns the replay timer, and runs callbacks.

use std::fmt;
use std::time::{Duration, Instant};

use super::event::{Decision, KeyEvent, KeyEventKind};
use crate::keys::KeyCode;

/// Default window for a press to count as a tap
pub const TAP_TIMEOUT: Duration = Duration::from_millis(200);
/// Default grace window for the second tap of a double-tap
pub const DOUBLE_TAP_TIMEOUT: Duration = Duration::from_millis(300);

/// Timing policy for the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// A hyper press released sooner than this is a tap
    pub tap_timeout: Duration,
    /// How long a tap waits for a second tap before replaying
    pub double_tap_timeout: Duration,
    /// When false a tap is replayed immediately and double-taps never fire
    pub double_tap_enabled: bool,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tap_timeout: TAP_TIMEOUT,
            double_tap_timeout: DOUBLE_TAP_TIMEOUT,
            double_tap_enabled: true,
        }
    }
}

/// The five states of the hyper key engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Normal typing; nothing tracked
    #[default]
    Idle,
    /// Hyper key is down and nothing else has happened yet
    PotentialHyper { pressed_at: Instant },
    /// Hyper key is held as a modifier
    HyperActive,
    /// A quick tap finished; waiting to see whether a second one follows
    WaitingForDoubleTap,
    /// Second press of a possible double-tap is down
    PotentialDoubleTap { pressed_at: Instant },
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::PotentialHyper { .. } => write!(f, "PotentialHyper"),
            State::HyperActive => write!(f, "HyperActive"),
            State::WaitingForDoubleTap => write!(f, "WaitingForDoubleTap"),
            State::PotentialDoubleTap { .. } => write!(f, "PotentialDoubleTap"),
        }
    }
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Hyper+key combo edge
    Activate(KeyCode),
    /// Combo key with no symbolic code; consumed but not reported
    Unmapped(u16),
    /// Quick double-tap confirmed
    DoubleTap,
    /// Re-type the hyper key now
    Replay,
    /// Start the double-tap grace timer
    ScheduleReplay,
    /// Drop the pending grace timer
    CancelReplay,
    /// Drop the pending grace timer, then re-type the hyper key
    CancelAndReplay,
}

/// Outcome of feeding one event to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub next: State,
    pub decision: Decision,
    pub effect: Option<Effect>,
}

impl Step {
    fn pass(next: State) -> Self {
        Self {
            next,
            decision: Decision::PassThrough,
            effect: None,
        }
    }

    fn suppress(next: State) -> Self {
        Self {
            next,
            decision: Decision::Suppress,
            effect: None,
        }
    }

    fn with(mut self, effect: Effect) -> Self {
        self.effect = Some(effect);
        self
    }
}

/// Compute the transition for `event` given the tracked hyper key.
pub fn step(state: State, event: &KeyEvent, hyper: u16, timing: &Timing) -> Step {
    let input = Input::classify(event, hyper);
    match state {
        State::Idle => step_from_idle(input, event),
        State::PotentialHyper { pressed_at } => {
            step_from_potential_hyper(input, event, pressed_at, timing)
        }
        State::HyperActive => step_from_hyper_active(input, event),
        State::WaitingForDoubleTap => step_from_waiting(input, event),
        State::PotentialDoubleTap { pressed_at } => {
            step_from_potential_double_tap(input, event, pressed_at, timing)
        }
    }
}

/// Transition taken when the double-tap grace timer fires.
///
/// Only meaningful in `WaitingForDoubleTap`; any other state means the
/// timer is stale and nothing happens.
pub fn step_on_timeout(state: State) -> Option<Step> {
    match state {
        State::WaitingForDoubleTap => Some(Step::suppress(State::Idle).with(Effect::Replay)),
        _ => None,
    }
}

/// Event reduced to what the transition table branches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    HyperDown { repeat: bool },
    HyperUp,
    OtherDown { repeat: bool },
    OtherUp,
    Flags,
}

impl Input {
    fn classify(event: &KeyEvent, hyper: u16) -> Self {
        let is_hyper = event.raw_code == hyper;
        let repeat = event.is_auto_repeat;
        match (event.kind, is_hyper) {
            (KeyEventKind::KeyDown, true) => Input::HyperDown { repeat },
            (KeyEventKind::KeyDown, false) => Input::OtherDown { repeat },
            (KeyEventKind::KeyUp, true) => Input::HyperUp,
            (KeyEventKind::KeyUp, false) => Input::OtherUp,
            (KeyEventKind::FlagsChanged, _) => Input::Flags,
        }
    }
}

fn combo_effect(raw_code: u16) -> Effect {
    match KeyCode::from_raw(raw_code) {
        Some(key) => Effect::Activate(key),
        None => Effect::Unmapped(raw_code),
    }
}

fn is_tap(pressed_at: Instant, released_at: Instant, timing: &Timing) -> bool {
    released_at.saturating_duration_since(pressed_at) < timing.tap_timeout
}

fn step_from_idle(input: Input, event: &KeyEvent) -> Step {
    match input {
        Input::HyperDown { repeat: false } => Step::suppress(State::PotentialHyper {
            pressed_at: event.timestamp,
        }),
        _ => Step::pass(State::Idle),
    }
}

fn step_from_potential_hyper(
    input: Input,
    event: &KeyEvent,
    pressed_at: Instant,
    timing: &Timing,
) -> Step {
    match input {
        Input::OtherDown { repeat: false } => {
            Step::suppress(State::HyperActive).with(combo_effect(event.raw_code))
        }
        Input::HyperUp if is_tap(pressed_at, event.timestamp, timing) => {
            if timing.double_tap_enabled {
                Step::suppress(State::WaitingForDoubleTap).with(Effect::ScheduleReplay)
            } else {
                Step::suppress(State::Idle).with(Effect::Replay)
            }
        }
        // Held past the tap window with nothing else pressed: discard
        Input::HyperUp => Step::suppress(State::Idle),
        Input::HyperDown { repeat: true } => Step::suppress(State::HyperActive),
        _ => Step::pass(State::PotentialHyper { pressed_at }),
    }
}

fn step_from_hyper_active(input: Input, event: &KeyEvent) -> Step {
    match input {
        Input::OtherDown { repeat: false } => {
            Step::suppress(State::HyperActive).with(combo_effect(event.raw_code))
        }
        // Auto-repeat of a combo key is swallowed without another activation
        Input::OtherDown { repeat: true } => Step::suppress(State::HyperActive),
        Input::HyperUp => Step::suppress(State::Idle),
        Input::OtherUp | Input::HyperDown { .. } => Step::suppress(State::HyperActive),
        Input::Flags => Step::pass(State::HyperActive),
    }
}

fn step_from_waiting(input: Input, event: &KeyEvent) -> Step {
    match input {
        Input::HyperDown { repeat: false } => Step::suppress(State::PotentialDoubleTap {
            pressed_at: event.timestamp,
        })
        .with(Effect::CancelReplay),
        Input::OtherDown { .. } => Step::pass(State::Idle).with(Effect::CancelAndReplay),
        _ => Step::pass(State::WaitingForDoubleTap),
    }
}

fn step_from_potential_double_tap(
    input: Input,
    event: &KeyEvent,
    pressed_at: Instant,
    timing: &Timing,
) -> Step {
    match input {
        Input::HyperUp if is_tap(pressed_at, event.timestamp, timing) => {
            Step::suppress(State::Idle).with(Effect::DoubleTap)
        }
        // Second press held too long: no signal and no replay
        Input::HyperUp => Step::suppress(State::Idle),
        Input::OtherDown { repeat: false } => {
            Step::suppress(State::HyperActive).with(combo_effect(event.raw_code))
        }
        Input::HyperDown { repeat: true } => Step::suppress(State::HyperActive),
        _ => Step::suppress(State::PotentialDoubleTap { pressed_at }),
    }
}
