//! voice-orchestrator: voice-driven assistant that runs one mode at a time
//!
//! The process hosts:
//! - A mode lifecycle controller on its own thread (prompt, run, repeat)
//! - One worker thread per active mode loop, joined before the next starts
//! - Cross-mode routing so any mode can open apps, search, or answer FAQs
//! - Signal handling that cancels the running mode and shuts down cleanly

mod config;
mod events;
mod intent;
mod lifecycle;
mod mode;
mod services;
mod state;

use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::ModeEvent;
use crate::lifecycle::ShutdownSignal;
use crate::services::Services;
use crate::state::{ContextStore, Controller, State};

/// How long to wait for the controller after a signal before giving up on it
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Log every lifecycle event until the channel closes. Returns how many were seen.
async fn log_events(mut rx: broadcast::Receiver<ModeEvent>) -> usize {
    let mut seen = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                seen += 1;
                info!(%event, "mode event");
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "mode event receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    seen
}

/// Wait for the controller to finish, or for `signal` to fire. On a signal,
/// call `on_signal` and give the controller `SHUTDOWN_GRACE` to stop.
/// Returns whether the controller finished.
async fn wait_for_controller<F>(
    done_rx: &mut oneshot::Receiver<State>,
    signal: F,
    on_signal: impl FnOnce(),
) -> bool
where
    F: Future<Output = ()>,
{
    tokio::select! {
        // Controller completion wins over a signal that is ready at the same time
        biased;

        result = &mut *done_rx => {
            match result {
                Ok(state) => info!(%state, "controller exited"),
                Err(_) => error!("controller thread exited without reporting"),
            }
            true
        }

        _ = signal => {
            info!("shutdown signal received");
            on_signal();
            // A capture blocked on stdin may never return; don't wait on it forever
            match tokio::time::timeout(SHUTDOWN_GRACE, done_rx).await {
                Ok(Ok(state)) => {
                    info!(%state, "controller exited");
                    true
                }
                Ok(Err(_)) => {
                    error!("controller thread exited without reporting");
                    true
                }
                Err(_) => {
                    warn!("controller did not stop in time, abandoning it");
                    false
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "voice-orchestrator starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.data_dir, "configuration loaded");

    let mut shutdown = ShutdownSignal::new()?;

    let services = Arc::new(Services::from_config(&config)?);
    let context = Arc::new(ContextStore::new());

    // Controller and router -> event logger
    let (event_tx, event_rx) = broadcast::channel::<ModeEvent>(64);

    let mut controller = Controller::new(services, Arc::clone(&context), event_tx);
    let handle = controller.shutdown_handle();

    // Logs during the shutdown grace period too; ends once the controller drops its sender
    let logger = tokio::spawn(log_events(event_rx));

    // The controller blocks on speech and capture, so it gets a dedicated thread
    let (done_tx, mut done_rx) = oneshot::channel();
    let controller_thread = thread::Builder::new()
        .name("mode-controller".to_string())
        .spawn(move || {
            controller.run();
            let _ = done_tx.send(controller.state());
        })?;

    info!("orchestrator initialized, entering main loop");

    let finished =
        wait_for_controller(&mut done_rx, shutdown.wait(), || handle.request_shutdown()).await;

    if finished {
        if controller_thread.join().is_err() {
            error!("controller thread panicked");
        }
        match logger.await {
            Ok(seen) => debug!(seen, "event logger exited"),
            Err(e) => warn!(?e, "event logger task failed"),
        }
    } else {
        logger.abort();
    }

    debug!(context = ?context.snapshot(), "final context");
    info!("voice-orchestrator stopped");

    Ok(())
}
