//! Periodic capture retry while input monitoring access is missing
//!
//! macOS gives no notification when the user grants access, so the only
//! way to notice is to try again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::capture::{CaptureBackend, CaptureManager};

/// Background task calling [`CaptureManager::start`] every `interval`
/// for as long as the manager reports `needs_permission`
pub struct PermissionRetry {
    handle: JoinHandle<()>,
}

impl PermissionRetry {
    /// Spawn the retry task on the current tokio runtime
    pub fn spawn<B>(manager: Arc<CaptureManager<B>>, interval: Duration) -> Self
    where
        B: CaptureBackend + 'static,
    {
        let mut permission = manager.subscribe_permission();

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "permission retry task started");
            loop {
                if !*permission.borrow_and_update() {
                    // Sleep until the flag is raised again
                    if permission.changed().await.is_err() {
                        break;
                    }
                    continue;
                }

                tokio::time::sleep(interval).await;
                debug!("retrying capture channel creation");
                manager.start();
            }
            debug!("permission retry task exited");
        });

        Self { handle }
    }

    /// Stop retrying
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for PermissionRetry {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
