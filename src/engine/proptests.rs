use std::time::{Duration, Instant};

use proptest::prelude::*;

use super::harness::{Fired, Harness};
use super::{Decision, KeyEvent, State, Timing};
use crate::keys::KeyCode;

const HYPER: KeyCode = KeyCode::F18;

/// One physically consistent gesture
#[derive(Debug, Clone)]
enum Op {
    /// Press and release the hyper key after `hold` ms
    HyperPress { hold: u64 },
    /// Hold hyper, tap `key`, release hyper
    Combo { key: KeyCode, hold: u64 },
    /// Tap a non-hyper key
    Other { key: KeyCode },
    /// Idle gap
    Wait { ms: u64 },
    /// Let every pending timer expire
    Fire,
}

fn other_key() -> impl Strategy<Value = KeyCode> {
    let keys: Vec<KeyCode> = KeyCode::ALL
        .iter()
        .copied()
        .filter(|key| *key != HYPER)
        .collect();
    proptest::sample::select(keys)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..400).prop_map(|hold| Op::HyperPress { hold }),
        (other_key(), 5u64..400).prop_map(|(key, hold)| Op::Combo { key, hold }),
        other_key().prop_map(|key| Op::Other { key }),
        (1u64..500).prop_map(|ms| Op::Wait { ms }),
        Just(Op::Fire),
    ]
}

/// What the gestures driven so far must have produced
#[derive(Debug, Default, PartialEq, Eq)]
struct Expected {
    /// Taps replayed as the hyper key's own character
    replays: usize,
    combos: usize,
    double_taps: usize,
    /// Non-hyper key-downs delivered to the OS
    passed: usize,
}

/// Drive `ops` through the engine while modelling the outcome of every
/// gesture: a quick tap stays pending until a second press, another key,
/// or the timer resolves it.
fn drive(h: &Harness, ops: &[Op]) -> Expected {
    let base = Instant::now();
    let mut now = 0u64;
    let at = |ms: u64| base + Duration::from_millis(ms);
    let tap_timeout = h.engine.timing().tap_timeout.as_millis() as u64;
    let mut expected = Expected::default();
    let mut pending_tap = false;

    for op in ops {
        match *op {
            Op::HyperPress { hold } => {
                let down = h.engine.process(&KeyEvent::key_down(HYPER.raw(), at(now)));
                let up = h.engine.process(&KeyEvent::key_up(HYPER.raw(), at(now + hold)));
                assert_eq!(down, Decision::Suppress);
                assert_eq!(up, Decision::Suppress);
                match (pending_tap, hold < tap_timeout) {
                    // Second quick press completes a double-tap
                    (true, true) => {
                        expected.double_taps += 1;
                        pending_tap = false;
                    }
                    // Second press held too long swallows both
                    (true, false) => pending_tap = false,
                    (false, true) => pending_tap = true,
                    // Held alone past the tap window: discarded
                    (false, false) => {}
                }
                now += hold + 1;
            }
            Op::Combo { key, hold } => {
                let before = h.fired().len();
                let down = h.engine.process(&KeyEvent::key_down(HYPER.raw(), at(now)));
                let combo = h.engine.process(&KeyEvent::key_down(key.raw(), at(now + 1)));
                h.engine.process(&KeyEvent::key_up(key.raw(), at(now + 2)));
                let up = h.engine.process(&KeyEvent::key_up(HYPER.raw(), at(now + hold + 3)));
                assert_eq!(down, Decision::Suppress);
                assert_eq!(combo, Decision::Suppress);
                assert_eq!(up, Decision::Suppress);
                assert_eq!(h.fired()[before..], [Fired::Activate(key)]);
                // A pending tap turns into the hold of this combo
                pending_tap = false;
                expected.combos += 1;
                now += hold + 4;
            }
            Op::Other { key } => {
                let replays = h.emitter.presses();
                let down = h.engine.process(&KeyEvent::key_down(key.raw(), at(now)));
                h.engine.process(&KeyEvent::key_up(key.raw(), at(now + 1)));
                assert_eq!(down, Decision::PassThrough);
                if pending_tap {
                    // Replayed before the key is let through
                    assert_eq!(h.emitter.presses(), replays + 1);
                    expected.replays += 1;
                    pending_tap = false;
                }
                expected.passed += 1;
                now += 2;
            }
            Op::Wait { ms } => now += ms,
            Op::Fire => {
                h.scheduler.fire_all();
                if pending_tap {
                    expected.replays += 1;
                    pending_tap = false;
                }
            }
        }
    }

    h.scheduler.fire_all();
    if pending_tap {
        expected.replays += 1;
    }
    expected
}

fn observed(h: &Harness, passed: usize) -> Expected {
    let fired = h.fired();
    Expected {
        replays: h.emitter.presses(),
        combos: fired.iter().filter(|f| matches!(f, Fired::Activate(_))).count(),
        double_taps: fired.iter().filter(|f| matches!(f, Fired::DoubleTap)).count(),
        passed,
    }
}

fn others(ops: &[Op]) -> usize {
    ops.iter().filter(|op| matches!(op, Op::Other { .. })).count()
}

proptest! {
    #[test]
    fn test_no_key_is_lost_or_duplicated(ops in prop::collection::vec(op(), 0..40)) {
        let h = Harness::new(HYPER, Timing::default());
        let expected = drive(&h, &ops);

        prop_assert_eq!(h.engine.state(), State::Idle);
        prop_assert!(!h.engine.has_pending_timer());
        prop_assert_eq!(observed(&h, others(&ops)), expected);
        prop_assert_eq!(h.emitter.posted().len(), 2 * h.emitter.presses());
    }

    #[test]
    fn test_reset_always_returns_to_idle(ops in prop::collection::vec(op(), 0..40), cut in 0usize..40) {
        let h = Harness::new(HYPER, Timing::default());
        let cut = cut.min(ops.len());
        drive(&h, &ops[..cut]);
        // Leave the hyper key physically down before resetting
        h.engine.process(&KeyEvent::key_down(HYPER.raw(), Instant::now()));
        h.engine.reset();

        prop_assert_eq!(h.engine.state(), State::Idle);
        prop_assert!(!h.engine.has_pending_timer());
        let replays_before = h.emitter.presses();
        h.scheduler.fire_ignoring_cancel();
        prop_assert_eq!(h.emitter.presses(), replays_before);
    }

    #[test]
    fn test_quick_taps_separated_by_timeouts_replay_once_each(
        holds in prop::collection::vec(1u64..200, 1..20)
    ) {
        let h = Harness::new(HYPER, Timing::default());
        let ops: Vec<Op> = holds
            .iter()
            .flat_map(|&hold| [Op::HyperPress { hold }, Op::Fire])
            .collect();
        let expected = drive(&h, &ops);

        prop_assert_eq!(expected.replays, holds.len());
        prop_assert_eq!(h.emitter.presses(), holds.len());
        prop_assert!(h.fired().is_empty());
    }
}
