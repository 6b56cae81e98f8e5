//! The hyper key engine
//!
//! Wraps the pure transition table with everything that has side effects:
//! the replay timer, synthetic replay, and application callbacks. One
//! instance is shared between the capture thread (`process`) and the timer
//! context (replay after the double-tap window).

use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::event::{Decision, KeyEvent};
use super::machine::{self, Effect, State, Timing};
use super::timer::{Scheduler, TimerHandle};
use crate::keys::{KeyCode, Modifiers};
use crate::synth::KeyEmitter;

/// Callback fired for every Hyper+key combo edge
pub type ActivateFn = Arc<dyn Fn(KeyCode) + Send + Sync>;
/// Callback fired for every confirmed double-tap
pub type DoubleTapFn = Arc<dyn Fn() + Send + Sync>;

/// Application callbacks.
///
/// Both run synchronously on the capture thread, after the engine lock is
/// released, and must hand real work off elsewhere.
#[derive(Clone, Default)]
pub struct Handlers {
    on_activate: Option<ActivateFn>,
    on_double_tap: Option<DoubleTapFn>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_activate(mut self, f: impl Fn(KeyCode) + Send + Sync + 'static) -> Self {
        self.on_activate = Some(Arc::new(f));
        self
    }

    pub fn on_double_tap(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_double_tap = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_activate", &self.on_activate.is_some())
            .field("on_double_tap", &self.on_double_tap.is_some())
            .finish()
    }
}

/// Mutable machine state, guarded by one lock
struct Machine {
    state: State,
    /// Bumped whenever a replay timer is scheduled or cancelled
    epoch: u64,
    /// Live iff `state` is `WaitingForDoubleTap`
    pending: Option<TimerHandle>,
}

impl Machine {
    fn cancel_pending(&mut self) {
        if let Some(timer) = self.pending.take() {
            timer.cancel();
        }
        self.epoch = self.epoch.wrapping_add(1);
    }
}

struct Shared {
    machine: Mutex<Machine>,
    hyper_key: AtomicU16,
    initial_hyper_key: KeyCode,
    timing: Timing,
    emitter: Arc<dyn KeyEmitter>,
    scheduler: Arc<dyn Scheduler>,
    handlers: Handlers,
}

/// Turns one configurable key into a tap/hold/double-tap modifier.
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct HyperKeyEngine {
    shared: Arc<Shared>,
}

impl HyperKeyEngine {
    pub fn new(
        hyper_key: KeyCode,
        timing: Timing,
        emitter: Arc<dyn KeyEmitter>,
        scheduler: Arc<dyn Scheduler>,
        handlers: Handlers,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                machine: Mutex::new(Machine {
                    state: State::Idle,
                    epoch: 0,
                    pending: None,
                }),
                hyper_key: AtomicU16::new(hyper_key.raw()),
                initial_hyper_key: hyper_key,
                timing,
                emitter,
                scheduler,
                handlers,
            }),
        }
    }

    /// Replace the tracked hyper key.
    ///
    /// Takes effect on the next [`process`](Self::process) call and leaves the
    /// current state alone; callers wanting a clean cut also call
    /// [`reset`](Self::reset).
    pub fn configure(&self, hyper_key: KeyCode) {
        let previous = self.shared.hyper_key.swap(hyper_key.raw(), Ordering::AcqRel);
        if previous != hyper_key.raw() {
            info!(hyper_key = hyper_key.name(), previous, "hyper key configured");
        }
    }

    /// The key currently tracked as the hyper key
    pub fn hyper_key(&self) -> KeyCode {
        // Only `KeyCode::raw` values are ever stored
        KeyCode::from_raw(self.shared.hyper_key.load(Ordering::Acquire))
            .unwrap_or(self.shared.initial_hyper_key)
    }

    pub fn timing(&self) -> Timing {
        self.shared.timing
    }

    /// Snapshot of the current state
    pub fn state(&self) -> State {
        self.shared.machine.lock().state
    }

    /// Feed one captured event and decide its fate.
    ///
    /// Never blocks beyond the engine's own short critical section.
    /// Callbacks and synthetic replays run after the lock is released, and
    /// a replay is always posted before this returns.
    pub fn process(&self, event: &KeyEvent) -> Decision {
        let hyper = self.shared.hyper_key.load(Ordering::Acquire);

        let (from, to, decision, effect) = {
            let mut machine = self.shared.machine.lock();
            let from = machine.state;
            let step = machine::step(from, event, hyper, &self.shared.timing);
            machine.state = step.next;

            let effect = match step.effect {
                Some(Effect::ScheduleReplay) => {
                    self.schedule_replay(&mut machine);
                    None
                }
                Some(Effect::CancelReplay) => {
                    machine.cancel_pending();
                    None
                }
                Some(Effect::CancelAndReplay) => {
                    machine.cancel_pending();
                    Some(Effect::Replay)
                }
                other => other,
            };
            (from, step.next, step.decision, effect)
        };

        if from != to {
            debug!(from = %from, to = %to, raw_code = event.raw_code, "state transition");
        } else {
            trace!(state = %from, raw_code = event.raw_code, ?decision, "event processed");
        }

        if let Some(effect) = effect {
            self.apply(effect, hyper);
        }
        decision
    }

    /// Cancel any pending replay and return to `Idle`
    pub fn reset(&self) {
        let from = {
            let mut machine = self.shared.machine.lock();
            machine.cancel_pending();
            std::mem::replace(&mut machine.state, State::Idle)
        };
        if from != State::Idle {
            debug!(from = %from, "engine reset");
        }
    }

    fn schedule_replay(&self, machine: &mut Machine) {
        machine.cancel_pending();
        let epoch = machine.epoch;
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let timer = self.shared.scheduler.schedule(
            self.shared.timing.double_tap_timeout,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    HyperKeyEngine { shared }.on_replay_timeout(epoch);
                }
            }),
        );
        machine.pending = Some(timer);
    }

    fn on_replay_timeout(&self, epoch: u64) {
        let mut machine = self.shared.machine.lock();
        if machine.epoch != epoch {
            debug!(epoch, current = machine.epoch, "stale replay timer ignored");
            return;
        }
        let Some(step) = machine::step_on_timeout(machine.state) else {
            debug!(state = %machine.state, "replay timer fired outside grace window");
            return;
        };
        machine.state = step.next;
        machine.pending = None;

        // Posted under the lock so a concurrent `process` cannot overtake it
        debug!("double-tap window elapsed, replaying hyper key");
        let hyper = self.shared.hyper_key.load(Ordering::Acquire);
        self.apply(Effect::Replay, hyper);
        drop(machine);
    }

    fn apply(&self, effect: Effect, hyper: u16) {
        match effect {
            Effect::Activate(key) => {
                debug!(key = key.name(), "hyper combo activated");
                if let Some(on_activate) = &self.shared.handlers.on_activate {
                    on_activate(key);
                }
            }
            Effect::Unmapped(raw_code) => {
                debug!(raw_code, "hyper combo with unmapped key consumed");
            }
            Effect::DoubleTap => {
                debug!("hyper double-tap");
                if let Some(on_double_tap) = &self.shared.handlers.on_double_tap {
                    on_double_tap();
                }
            }
            Effect::Replay => {
                if let Err(e) = self.shared.emitter.post_key_press(hyper, Modifiers::NONE) {
                    warn!(?e, raw_code = hyper, "failed to replay hyper key");
                }
            }
            // Timer bookkeeping happens under the lock in `process`
            Effect::ScheduleReplay | Effect::CancelReplay | Effect::CancelAndReplay => {}
        }
    }

    #[cfg(test)]
    pub(crate) fn has_pending_timer(&self) -> bool {
        self.shared.machine.lock().pending.is_some()
    }
}

impl fmt::Debug for HyperKeyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperKeyEngine")
            .field("hyper_key", &self.hyper_key())
            .field("state", &self.state())
            .field("timing", &self.shared.timing)
            .finish_non_exhaustive()
    }
}
