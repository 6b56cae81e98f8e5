//! CoreGraphics synthetic event poster

use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation, CGKeyCode, EventField};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use tracing::trace;

use super::{EmitError, KeyEmitter, SYNTHETIC_EVENT_TAG};
use crate::keys::Modifiers;

/// Posts keyboard events through CoreGraphics.
///
/// Events are posted at the annotated-session location, downstream of the
/// session tap the capture channel installs, and are tagged so a tap placed
/// anywhere still recognises them.
#[derive(Debug, Default, Clone, Copy)]
pub struct CgEmitter;

impl CgEmitter {
    pub fn new() -> Self {
        Self
    }

    fn build(&self, code: u16, modifiers: Modifiers, down: bool) -> Result<CGEvent, EmitError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| EmitError::EventSource)?;
        let event = CGEvent::new_keyboard_event(source, code as CGKeyCode, down)
            .map_err(|_| EmitError::EventCreate(code))?;
        event.set_flags(CGEventFlags::from_bits_truncate(modifiers.bits()));
        event.set_integer_value_field(EventField::EVENT_SOURCE_USER_DATA, SYNTHETIC_EVENT_TAG);
        Ok(event)
    }
}

impl KeyEmitter for CgEmitter {
    fn post_key_down(&self, code: u16, modifiers: Modifiers) -> Result<(), EmitError> {
        let event = self.build(code, modifiers, true)?;
        event.post(CGEventTapLocation::AnnotatedSession);
        trace!(code, ?modifiers, "posted synthetic key down");
        Ok(())
    }

    fn post_key_up(&self, code: u16, modifiers: Modifiers) -> Result<(), EmitError> {
        let event = self.build(code, modifiers, false)?;
        event.post(CGEventTapLocation::AnnotatedSession);
        trace!(code, ?modifiers, "posted synthetic key up");
        Ok(())
    }

    fn post_key_press(&self, code: u16, modifiers: Modifiers) -> Result<(), EmitError> {
        // Build both halves first so a key-down is never posted without its key-up
        let down = self.build(code, modifiers, true)?;
        let up = self.build(code, modifiers, false)?;
        down.post(CGEventTapLocation::AnnotatedSession);
        up.post(CGEventTapLocation::AnnotatedSession);
        trace!(code, ?modifiers, "posted synthetic key press");
        Ok(())
    }
}
