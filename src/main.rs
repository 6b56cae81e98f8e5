//! hyperkeys-daemon: background daemon turning one key into a Hyper key
//!
//! This daemon runs as a LaunchAgent and provides:
//! - Keyboard capture via CGEventTap
//! - The tap/hold/double-tap hyper key engine
//! - Caps Lock → F18 remapping while running
//!
//! Resolving activations to actions is left to the consumer; the daemon
//! logs every activation and double-tap it sees.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hyperkeys::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Config first so it can supply the default log filter
    let config = Config::load()?;

    // The capture thread logs too; never let it block on stderr
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(writer)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        hyper_key = config.hyper_key.name(),
        "hyperkeys-daemon starting"
    );

    run(config).await
}

#[cfg(not(target_os = "macos"))]
async fn run(_config: Config) -> Result<()> {
    Err(hyperkeys::capture::CaptureError::Unsupported.into())
}

#[cfg(target_os = "macos")]
async fn run(config: Config) -> Result<()> {
    daemon::run(config).await
}

#[cfg(target_os = "macos")]
mod daemon {
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use tokio::signal::unix::{signal, SignalKind};
    use tokio::sync::{mpsc, watch};
    use tokio::task::JoinHandle;
    use tracing::{error, info, warn};

    use hyperkeys::capture::{CaptureBackend, CaptureManager, EventTapBackend};
    use hyperkeys::config::Config;
    use hyperkeys::engine::{Handlers, HyperKeyEngine, TokioScheduler};
    use hyperkeys::events::AppEvent;
    use hyperkeys::keys::hidutil::CapsLockRemap;
    use hyperkeys::lifecycle::{PermissionRetry, ShutdownSignal};
    use hyperkeys::synth::CgEmitter;

    pub async fn run(config: Config) -> Result<()> {
        let scheduler = TokioScheduler::current().context("no tokio runtime for replay timers")?;
        let mut hangup = signal(SignalKind::hangup()).context("failed to register SIGHUP")?;

        // Engine callbacks run on the capture thread -> app events
        let (event_tx, event_rx) = mpsc::channel::<AppEvent>(64);
        let handlers = {
            let activate_tx = event_tx.clone();
            let double_tap_tx = event_tx.clone();
            Handlers::new()
                .on_activate(move |key| forward(&activate_tx, AppEvent::Activated { key }))
                .on_double_tap(move || forward(&double_tap_tx, AppEvent::DoubleTap))
        };

        let engine = HyperKeyEngine::new(
            config.engine_hyper_key(),
            config.timing(),
            Arc::new(CgEmitter::new()),
            Arc::new(scheduler),
            handlers,
        );

        let mut remap = CapsLockRemap::new();
        if config.needs_caps_lock_remap() {
            remap.enable().context("failed to remap caps lock")?;
        }

        let backend = EventTapBackend::new();
        if !backend.has_permission() {
            warn!("input monitoring permission not granted yet");
        }

        let manager = Arc::new(CaptureManager::new(backend, engine));
        manager.start();

        let retry = PermissionRetry::spawn(
            Arc::clone(&manager),
            config.permission_retry_interval(),
        );
        let permission_watch = watch_permission(manager.subscribe_permission(), event_tx);

        let shutdown = ShutdownSignal::new();
        let dispatcher = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                dispatch(event_rx).await;
                info!("event dispatcher exited");
                shutdown.trigger();
            })
        };
        info!("daemon initialized, entering main loop");

        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    info!("SIGHUP received, reloading configuration");
                    reload(&manager, &mut remap);
                }
                result = shutdown.wait() => {
                    match result {
                        Ok(()) => info!("shutdown signal received"),
                        Err(e) => error!(%e, "failed to register signal handlers"),
                    }
                    break;
                }
            }
        }

        info!("shutting down...");

        retry.stop();
        permission_watch.abort();
        dispatcher.abort();
        manager.stop();
        if let Err(e) = remap.disable() {
            error!(%e, "failed to clear caps lock remap");
        }

        info!("hyperkeys-daemon stopped");
        Ok(())
    }

    /// Re-read the config file and apply the hyper key and remap settings.
    ///
    /// Timing changes need a restart; the engine fixes them at construction.
    fn reload<B: CaptureBackend>(manager: &CaptureManager<B>, remap: &mut CapsLockRemap) {
        let config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                error!(error = ?e, "failed to reload configuration, keeping current");
                return;
            }
        };

        if config.needs_caps_lock_remap() {
            if !remap.is_active() {
                if let Err(e) = remap.enable() {
                    error!(%e, "failed to remap caps lock, keeping current hyper key");
                    return;
                }
            }
        } else if let Err(e) = remap.disable() {
            warn!(%e, "failed to clear caps lock remap");
        }

        manager.set_hyper_key(config.engine_hyper_key());
        info!(hyper_key = config.hyper_key.name(), "configuration reloaded");
    }

    /// Hand an event to the async side without blocking the capture thread
    fn forward(tx: &mpsc::Sender<AppEvent>, event: AppEvent) {
        if let Err(e) = tx.try_send(event) {
            warn!(%e, "dropping app event");
        }
    }

    /// Turn permission flag changes into app events
    fn watch_permission(
        mut permission: watch::Receiver<bool>,
        tx: mpsc::Sender<AppEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut reported = false;
            loop {
                let needs_permission = *permission.borrow_and_update();
                if needs_permission != reported {
                    let event = AppEvent::PermissionChanged { needs_permission };
                    if tx.send(event).await.is_err() {
                        break;
                    }
                    reported = needs_permission;
                }
                if permission.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    async fn dispatch(mut rx: mpsc::Receiver<AppEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                AppEvent::PermissionChanged {
                    needs_permission: true,
                } => {
                    warn!(%event, "grant Input Monitoring access in System Settings");
                }
                _ => info!(%event, "app event"),
            }
        }
    }
}
