//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::Timing;
use crate::keys::hidutil::CapsLockRemap;
use crate::keys::KeyCode;

/// Environment variable overriding the hyper key (a key name like `tab`)
pub const HYPER_KEY_ENV: &str = "HYPERKEYS_HYPER_KEY";
/// Environment variable toggling double-tap detection
pub const DOUBLE_TAP_ENV: &str = "HYPERKEYS_DOUBLE_TAP";

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key acting as the hyper modifier
    pub hyper_key: KeyCode,

    /// Longest hold that still counts as a tap
    pub tap_timeout_ms: u64,

    /// Window after a tap in which a second tap makes a double-tap
    pub double_tap_timeout_ms: u64,

    pub double_tap_enabled: bool,

    /// Seconds between capture retries while permission is missing
    pub permission_retry_secs: u64,

    /// Remap Caps Lock to F18 with `hidutil` while the daemon runs
    pub remap_caps_lock: bool,

    /// Default log filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hyper_key: KeyCode::CapsLock,
            tap_timeout_ms: 200,
            double_tap_timeout_ms: 300,
            double_tap_enabled: true,
            permission_retry_secs: 2,
            remap_caps_lock: true,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let mut config = Self::load_from(&Self::path_in(Path::new(&home)))?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Location of the config file under `home`
    pub fn path_in(home: &Path) -> PathBuf {
        home.join(".config").join("hyperkeys").join("config.json")
    }

    /// Read `path`, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        serde_json::from_str(&contents)
            .with_context(|| format!("malformed config file {}", path.display()))
    }

    /// Apply environment overrides, reading variables through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(HYPER_KEY_ENV) {
            self.hyper_key = value
                .parse()
                .with_context(|| format!("invalid {}", HYPER_KEY_ENV))?;
        }
        if let Some(value) = lookup(DOUBLE_TAP_ENV) {
            self.double_tap_enabled = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                other => bail!("invalid {}: {:?}", DOUBLE_TAP_ENV, other),
            };
        }
        Ok(())
    }

    /// Engine timing derived from this configuration
    pub fn timing(&self) -> Timing {
        Timing {
            tap_timeout: Duration::from_millis(self.tap_timeout_ms),
            double_tap_timeout: Duration::from_millis(self.double_tap_timeout_ms),
            double_tap_enabled: self.double_tap_enabled,
        }
    }

    /// Whether Caps Lock must be remapped before capture starts
    pub fn needs_caps_lock_remap(&self) -> bool {
        self.remap_caps_lock && self.hyper_key == KeyCode::CapsLock
    }

    /// The key the engine should track
    pub fn engine_hyper_key(&self) -> KeyCode {
        if self.needs_caps_lock_remap() {
            CapsLockRemap::tracked_key()
        } else {
            self.hyper_key
        }
    }

    pub fn permission_retry_interval(&self) -> Duration {
        Duration::from_secs(self.permission_retry_secs)
    }
}
