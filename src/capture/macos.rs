//! CGEventTap capture backend
//!
//! Installs a filtering session tap on a dedicated thread that runs its own
//! CFRunLoop. The tap callback must be fast and non-blocking: macOS
//! disables taps whose callbacks stall.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use core_foundation::base::TCFType;
use core_foundation::mach_port::CFMachPortRef;
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventTapProxy, CGEventType, EventField,
};
use tracing::{debug, error, info};

use super::{
    CaptureBackend, CaptureChannel, CaptureError, ChannelControl, DisableReason, TapEvent,
    TapHandler,
};
use crate::engine::{Decision, KeyEvent, KeyEventKind};
use crate::keys::Modifiers;
use crate::synth::SYNTHETIC_EVENT_TAG;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
    fn CGEventTapIsEnabled(tap: CFMachPortRef) -> bool;
    fn CGPreflightListenEventAccess() -> bool;
    fn CGRequestListenEventAccess() -> bool;
}

/// How long the run loop runs before checking the stop flag
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

/// Opens CGEventTap capture channels
#[derive(Debug, Default, Clone, Copy)]
pub struct EventTapBackend;

impl EventTapBackend {
    pub fn new() -> Self {
        Self
    }

    /// Whether input monitoring access is already granted
    pub fn has_permission(&self) -> bool {
        unsafe { CGPreflightListenEventAccess() }
    }
}

impl CaptureBackend for EventTapBackend {
    fn open(&self, handler: TapHandler) -> Result<Box<dyn CaptureChannel>, CaptureError> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_running = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("hyperkeys-capture".to_string())
            .spawn(move || {
                info!("capture thread started");
                run_event_loop(handler, thread_running, ready_tx);
                info!("capture thread stopped");
            })
            .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(TapChannel {
                running,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::ThreadSpawn(
                    "capture thread exited during setup".to_string(),
                ))
            }
        }
    }

    fn request_permission(&self) {
        let granted = unsafe { CGRequestListenEventAccess() };
        debug!(granted, "requested input monitoring access");
    }
}

/// The live tap, owned by its capture thread
struct TapChannel {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureChannel for TapChannel {
    fn close(mut self: Box<Self>) {
        self.running.store(false, Ordering::SeqCst);
        // The run loop notices within one slice, then tears the tap down
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("capture thread panicked");
            }
        }
    }
}

/// Re-enables the tap from inside its own callback
struct TapControl {
    port: CFMachPortRef,
}

impl ChannelControl for TapControl {
    fn reenable(&self) -> Result<(), CaptureError> {
        if self.port.is_null() {
            return Err(CaptureError::ReenableFailed);
        }
        unsafe {
            CGEventTapEnable(self.port, true);
            if CGEventTapIsEnabled(self.port) {
                Ok(())
            } else {
                Err(CaptureError::ReenableFailed)
            }
        }
    }
}

/// Translate a tap callback into what the manager understands
fn classify(event_type: CGEventType, event: &CGEvent) -> Option<TapEvent> {
    let kind = match event_type {
        CGEventType::TapDisabledByTimeout => {
            return Some(TapEvent::Disabled(DisableReason::Timeout))
        }
        CGEventType::TapDisabledByUserInput => {
            return Some(TapEvent::Disabled(DisableReason::UserInput))
        }
        CGEventType::KeyDown => KeyEventKind::KeyDown,
        CGEventType::KeyUp => KeyEventKind::KeyUp,
        CGEventType::FlagsChanged => KeyEventKind::FlagsChanged,
        _ => return None,
    };

    if event.get_integer_value_field(EventField::EVENT_SOURCE_USER_DATA) == SYNTHETIC_EVENT_TAG {
        return Some(TapEvent::Synthetic);
    }

    Some(TapEvent::Key(KeyEvent {
        kind,
        raw_code: event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16,
        is_auto_repeat: event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT) != 0,
        timestamp: Instant::now(),
        modifiers: Modifiers::from_bits(event.get_flags().bits()),
    }))
}

/// Create the tap, report the outcome, and run the loop until stopped
fn run_event_loop(
    handler: TapHandler,
    running: Arc<AtomicBool>,
    ready: mpsc::Sender<Result<(), CaptureError>>,
) {
    // Filled in once the tap exists; the callback cannot see the tap itself
    let port: Rc<Cell<CFMachPortRef>> = Rc::new(Cell::new(std::ptr::null_mut()));
    let callback_port = Rc::clone(&port);

    let callback = move |_proxy: CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
          -> Option<CGEvent> {
        let tap_event = classify(event_type, event)?;
        let control = TapControl {
            port: callback_port.get(),
        };
        match handler(tap_event, &control) {
            // None keeps the original event
            Decision::PassThrough => None,
            Decision::Suppress => {
                let dropped = event.clone();
                dropped.set_type(CGEventType::Null);
                Some(dropped)
            }
        }
    };

    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
        ],
        callback,
    ) {
        Ok(tap) => tap,
        Err(()) => {
            error!("failed to create event tap - is Input Monitoring permission granted?");
            let _ = ready.send(Err(CaptureError::PermissionDenied));
            return;
        }
    };
    port.set(tap.mach_port.as_concrete_TypeRef());

    let source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = ready.send(Err(CaptureError::RunLoopSource));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();
    info!("event tap created and enabled");
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, true);
        }
    }

    unsafe {
        CGEventTapEnable(port.get(), false);
        run_loop.remove_source(&source, kCFRunLoopCommonModes);
    }
    debug!("event tap disabled and removed from run loop");
}
