//! In-memory capture backend; the test plays the OS by calling the handler

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{CaptureBackend, CaptureChannel, CaptureError, ChannelControl, TapEvent, TapHandler};
use crate::engine::Decision;

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub deny: AtomicBool,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    pub permission_requests: AtomicUsize,
    handler: Mutex<Option<TapHandler>>,
}

struct FakeChannel {
    closed: Arc<AtomicUsize>,
}

impl CaptureChannel for FakeChannel {
    fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl CaptureBackend for Arc<FakeBackend> {
    fn open(&self, handler: TapHandler) -> Result<Box<dyn CaptureChannel>, CaptureError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.handler.lock() = Some(handler);
        Ok(Box::new(FakeChannel {
            closed: Arc::clone(&self.closed),
        }))
    }

    fn request_permission(&self) {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakeControl {
    fail: bool,
    pub reenabled: AtomicUsize,
}

impl FakeControl {
    pub fn new(fail: bool) -> Self {
        Self {
            fail,
            reenabled: AtomicUsize::new(0),
        }
    }
}

impl ChannelControl for FakeControl {
    fn reenable(&self) -> Result<(), CaptureError> {
        self.reenabled.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(CaptureError::ReenableFailed)
        } else {
            Ok(())
        }
    }
}

/// Hand `event` to the handler of the most recently opened channel
pub(crate) fn deliver(backend: &FakeBackend, event: TapEvent, control: &FakeControl) -> Decision {
    let handler = backend.handler.lock().clone().expect("channel not open");
    handler(event, control)
}
