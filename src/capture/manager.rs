//! Capture channel lifecycle
//!
//! Starts and stops the channel, turns creation failure into an
//! observable permission flag, and re-enables the channel the moment the
//! OS reports it disabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{CaptureBackend, CaptureChannel, ChannelControl, TapEvent, TapHandler};
use crate::engine::{Decision, HyperKeyEngine};
use crate::keys::KeyCode;

/// State shared between the manager and its per-event callback
struct Status {
    needs_permission: watch::Sender<bool>,
    /// Set when a forced disable could not be undone
    faulted: AtomicBool,
}

impl Status {
    fn set_needs_permission(&self, value: bool) {
        let changed = self.needs_permission.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        if changed {
            info!(needs_permission = value, "permission state changed");
        }
    }
}

/// Owns the capture channel and feeds its events to the engine
pub struct CaptureManager<B: CaptureBackend> {
    backend: B,
    engine: HyperKeyEngine,
    channel: Mutex<Option<Box<dyn CaptureChannel>>>,
    status: Arc<Status>,
}

impl<B: CaptureBackend> CaptureManager<B> {
    pub fn new(backend: B, engine: HyperKeyEngine) -> Self {
        let (needs_permission, _) = watch::channel(false);
        Self {
            backend,
            engine,
            channel: Mutex::new(None),
            status: Arc::new(Status {
                needs_permission,
                faulted: AtomicBool::new(false),
            }),
        }
    }

    pub fn engine(&self) -> &HyperKeyEngine {
        &self.engine
    }

    /// Whether the last creation attempt failed for lack of permission
    pub fn needs_permission(&self) -> bool {
        *self.status.needs_permission.borrow()
    }

    /// Observe changes to [`needs_permission`](Self::needs_permission)
    pub fn subscribe_permission(&self) -> watch::Receiver<bool> {
        self.status.needs_permission.subscribe()
    }

    /// Whether a channel is currently open
    pub fn is_running(&self) -> bool {
        self.channel.lock().is_some()
    }

    /// Open the channel if it is not already open.
    ///
    /// Failure is not returned: it raises `needs_permission` and asks the
    /// OS for access. A channel that faulted after a failed re-enable is
    /// torn down and recreated.
    pub fn start(&self) {
        let mut channel = self.channel.lock();

        if channel.is_some() {
            if !self.status.faulted.load(Ordering::Acquire) {
                debug!("capture channel already running");
                return;
            }
            warn!("recreating faulted capture channel");
            if let Some(old) = channel.take() {
                old.close();
            }
            self.engine.reset();
        }

        info!(hyper_key = self.engine.hyper_key().name(), "creating capture channel");

        match self.backend.open(self.handler()) {
            Ok(opened) => {
                *channel = Some(opened);
                self.status.faulted.store(false, Ordering::Release);
                self.status.set_needs_permission(false);
                info!("capture channel created and enabled");
            }
            Err(e) => {
                warn!(%e, "failed to create capture channel, requesting permission");
                self.status.set_needs_permission(true);
                self.backend.request_permission();
            }
        }
    }

    /// Close the channel if open and return the engine to `Idle`
    pub fn stop(&self) {
        let Some(channel) = self.channel.lock().take() else {
            return;
        };
        channel.close();
        self.status.faulted.store(false, Ordering::Release);
        self.engine.reset();
        info!("capture channel stopped");
    }

    /// Switch the hyper key, abandoning any combo in flight
    pub fn set_hyper_key(&self, key: KeyCode) {
        self.engine.configure(key);
        self.engine.reset();
    }

    fn handler(&self) -> TapHandler {
        let engine = self.engine.clone();
        let status = Arc::clone(&self.status);
        Arc::new(move |event: TapEvent, control: &dyn ChannelControl| match event {
            TapEvent::Disabled(reason) => {
                // Re-enable before anything else; every event until then is lost
                match control.reenable() {
                    Ok(()) => warn!(?reason, "capture channel disabled by the OS, re-enabled"),
                    Err(e) => {
                        error!(?reason, %e, "capture channel disabled and re-enable failed");
                        status.faulted.store(true, Ordering::Release);
                        status.set_needs_permission(true);
                    }
                }
                Decision::PassThrough
            }
            TapEvent::Synthetic => Decision::PassThrough,
            TapEvent::Key(key_event) => engine.process(&key_event),
        })
    }
}

impl<B: CaptureBackend> Drop for CaptureManager<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::capture::fake::{deliver, FakeBackend, FakeControl};
    use crate::capture::DisableReason;
    use crate::engine::harness::{Fired, Harness};
    use crate::engine::{KeyEvent, State, Timing};

    fn setup() -> (CaptureManager<Arc<FakeBackend>>, Arc<FakeBackend>, Harness) {
        let harness = Harness::new(KeyCode::F18, Timing::default());
        let backend = Arc::new(FakeBackend::default());
        let manager = CaptureManager::new(Arc::clone(&backend), harness.engine.clone());
        (manager, backend, harness)
    }

    #[test]
    fn test_start_is_idempotent() {
        let (manager, backend, _h) = setup();
        assert!(!manager.is_running());

        manager.start();
        manager.start();
        assert!(manager.is_running());
        assert!(!manager.needs_permission());
        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (manager, backend, _h) = setup();
        manager.stop();
        manager.start();
        manager.stop();
        manager.stop();
        assert!(!manager.is_running());
        assert_eq!(backend.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_permission_denied_sets_flag_and_requests_access() {
        let (manager, backend, _h) = setup();
        let mut observer = manager.subscribe_permission();
        backend.deny.store(true, Ordering::SeqCst);

        manager.start();
        assert!(!manager.is_running());
        assert!(manager.needs_permission());
        assert!(observer.has_changed().unwrap());
        assert!(*observer.borrow_and_update());
        assert_eq!(backend.permission_requests.load(Ordering::SeqCst), 1);

        // Permission granted; the next retry clears the flag
        backend.deny.store(false, Ordering::SeqCst);
        manager.start();
        assert!(manager.is_running());
        assert!(!manager.needs_permission());
        assert!(!*observer.borrow_and_update());
    }

    #[test]
    fn test_key_events_reach_engine() {
        let (manager, backend, h) = setup();
        manager.start();
        let control = FakeControl::new(false);
        let t0 = Instant::now();

        let down = TapEvent::Key(KeyEvent::key_down(KeyCode::F18.raw(), t0));
        assert_eq!(deliver(&backend, down, &control), Decision::Suppress);
        let combo = TapEvent::Key(KeyEvent::key_down(KeyCode::W.raw(), t0));
        assert_eq!(deliver(&backend, combo, &control), Decision::Suppress);
        assert_eq!(manager.engine().state(), State::HyperActive);
        assert_eq!(h.fired().len(), 1);
        assert_eq!(control.reenabled.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_synthetic_events_bypass_engine() {
        let (manager, backend, _h) = setup();
        manager.start();
        let control = FakeControl::new(false);
        assert_eq!(
            deliver(&backend, TapEvent::Synthetic, &control),
            Decision::PassThrough
        );
        assert_eq!(manager.engine().state(), State::Idle);
    }

    #[test]
    fn test_forced_disable_is_reenabled_immediately() {
        let (manager, backend, _h) = setup();
        manager.start();
        let control = FakeControl::new(false);

        let decision = deliver(
            &backend,
            TapEvent::Disabled(DisableReason::Timeout),
            &control,
        );
        assert_eq!(decision, Decision::PassThrough);
        assert_eq!(control.reenabled.load(Ordering::SeqCst), 1);
        assert!(!manager.needs_permission());

        // Still running; start stays a no-op
        manager.start();
        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_reenable_requires_full_restart() {
        let (manager, backend, _h) = setup();
        manager.start();
        let control = FakeControl::new(true);

        deliver(
            &backend,
            TapEvent::Disabled(DisableReason::UserInput),
            &control,
        );
        assert!(manager.needs_permission());

        manager.start();
        assert_eq!(backend.closed.load(Ordering::SeqCst), 1);
        assert_eq!(backend.opened.load(Ordering::SeqCst), 2);
        assert!(!manager.needs_permission());
        assert!(manager.is_running());
    }

    #[test]
    fn test_stop_resets_engine_and_pending_replay() {
        let (manager, backend, h) = setup();
        manager.start();
        let control = FakeControl::new(false);
        let t0 = Instant::now();

        deliver(
            &backend,
            TapEvent::Key(KeyEvent::key_down(KeyCode::F18.raw(), t0)),
            &control,
        );
        deliver(
            &backend,
            TapEvent::Key(KeyEvent::key_up(
                KeyCode::F18.raw(),
                t0 + Duration::from_millis(40),
            )),
            &control,
        );
        assert_eq!(manager.engine().state(), State::WaitingForDoubleTap);

        manager.stop();
        assert_eq!(manager.engine().state(), State::Idle);
        h.scheduler.fire_ignoring_cancel();
        assert!(h.emitter.posted().is_empty());
    }

    #[test]
    fn test_set_hyper_key_resets_state() {
        let (manager, backend, _h) = setup();
        manager.start();
        let control = FakeControl::new(false);
        deliver(
            &backend,
            TapEvent::Key(KeyEvent::key_down(KeyCode::F18.raw(), Instant::now())),
            &control,
        );

        manager.set_hyper_key(KeyCode::Tab);
        assert_eq!(manager.engine().hyper_key(), KeyCode::Tab);
        assert_eq!(manager.engine().state(), State::Idle);
    }

    #[test]
    fn test_set_hyper_key_on_live_channel() {
        let (manager, backend, h) = setup();
        manager.start();
        let control = FakeControl::new(false);
        let t0 = Instant::now();

        manager.set_hyper_key(KeyCode::Tab);
        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);

        // The old key is ordinary typing now
        let old = TapEvent::Key(KeyEvent::key_down(KeyCode::F18.raw(), t0));
        assert_eq!(deliver(&backend, old, &control), Decision::PassThrough);
        assert_eq!(manager.engine().state(), State::Idle);

        let down = TapEvent::Key(KeyEvent::key_down(KeyCode::Tab.raw(), t0));
        assert_eq!(deliver(&backend, down, &control), Decision::Suppress);
        let combo = TapEvent::Key(KeyEvent::key_down(KeyCode::J.raw(), t0));
        assert_eq!(deliver(&backend, combo, &control), Decision::Suppress);
        assert_eq!(h.fired(), vec![Fired::Activate(KeyCode::J)]);
    }

    #[test]
    fn test_drop_closes_channel() {
        let (manager, backend, _h) = setup();
        manager.start();
        drop(manager);
        assert_eq!(backend.closed.load(Ordering::SeqCst), 1);
    }
}
