//! Caps Lock → F18 remapping at the HID layer
//!
//! macOS delivers Caps Lock only as FlagsChanged events, which cannot be
//! suppressed and replayed like an ordinary key. Remapping it to F18 with
//! `hidutil` turns it into a plain KeyDown/KeyUp key the engine can track.

use std::process::{Command, Stdio};

use serde_json::{json, Value};
use tracing::{debug, info};

use super::KeyCode;

/// HID usage ID of Caps Lock (keyboard page 0x07)
const CAPS_LOCK_USAGE: u64 = 0x7_0000_0039;
/// HID usage ID of F18 (keyboard page 0x07)
const F18_USAGE: u64 = 0x7_0000_006D;

/// Errors raised while applying a `hidutil` mapping
#[derive(Debug, thiserror::Error)]
pub enum RemapError {
    #[error("failed to run hidutil: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("hidutil exited with status {0}")]
    Exit(std::process::ExitStatus),
}

/// The `UserKeyMapping` property that sends Caps Lock as F18
fn caps_lock_mapping() -> Value {
    json!({
        "UserKeyMapping": [{
            "HIDKeyboardModifierMappingSrc": CAPS_LOCK_USAGE,
            "HIDKeyboardModifierMappingDst": F18_USAGE,
        }]
    })
}

/// The `UserKeyMapping` property with every user mapping removed
fn cleared_mapping() -> Value {
    json!({ "UserKeyMapping": [] })
}

/// Applies and removes the Caps Lock → F18 mapping
#[derive(Debug, Default)]
pub struct CapsLockRemap {
    active: bool,
}

impl CapsLockRemap {
    /// Create an inactive remap
    pub fn new() -> Self {
        Self::default()
    }

    /// Key the engine must track while the remap is active
    pub fn tracked_key() -> KeyCode {
        KeyCode::F18
    }

    /// Whether the mapping is currently applied
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Apply the mapping
    pub fn enable(&mut self) -> Result<(), RemapError> {
        set_property(&caps_lock_mapping())?;
        self.active = true;
        info!("caps lock remapped to F18");
        Ok(())
    }

    /// Remove all user key mappings
    pub fn disable(&mut self) -> Result<(), RemapError> {
        if !self.active {
            return Ok(());
        }
        set_property(&cleared_mapping())?;
        self.active = false;
        info!("caps lock remap cleared");
        Ok(())
    }
}

fn set_property(value: &Value) -> Result<(), RemapError> {
    let payload = value.to_string();
    debug!(%payload, "hidutil property --set");
    let status = Command::new("hidutil")
        .args(["property", "--set", &payload])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(RemapError::Exit(status))
    }
}
