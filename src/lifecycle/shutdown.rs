//! Graceful shutdown on SIGTERM, SIGINT, or an in-process request

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::debug;

/// Resolves when the daemon should stop
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every waiter to shut down
    pub fn trigger(&self) {
        debug!("shutdown requested");
        self.requested.notify_waiters();
        // A waiter that has not polled yet still sees the request
        self.requested.notify_one();
    }

    /// Wait for a signal or a [`trigger`](Self::trigger).
    ///
    /// Fails only if the signal handlers cannot be registered.
    pub async fn wait(&self) -> std::io::Result<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = sigint.recv() => {
                debug!("received SIGINT");
            }
            _ = self.requested.notified() => {
                debug!("received shutdown request");
            }
        }
        Ok(())
    }
}
