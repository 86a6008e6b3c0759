//! Background sweep of idle sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::provider::SessionProvider;

/// Handle to a running sweep task.
///
/// Dropping the handle stops the task at its next wake-up; call
/// [`shutdown`](Self::shutdown) to stop it and wait for it to finish.
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Token that stops the sweep when cancelled.
    ///
    /// Useful for tying the sweep to an application-wide shutdown signal.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the sweep and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Session sweeper task ended abnormally");
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start sweeping `provider` every `period`, evicting sessions idle for at
/// least `max_idle`.
///
/// The first sweep runs one full period after start. A sweep that overruns
/// its period causes the missed ticks to be skipped, never queued.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
pub fn spawn_sweeper<P: SessionProvider>(
    provider: Arc<P>,
    max_idle: Duration,
    period: Duration,
) -> SweeperHandle {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(provider, max_idle, period, cancel.clone()));

    SweeperHandle {
        cancel,
        task: Some(task),
    }
}

async fn run<P: SessionProvider>(
    provider: Arc<P>,
    max_idle: Duration,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        period_ms = period.as_millis() as u64,
        max_idle_ms = max_idle.as_millis() as u64,
        "Session sweeper started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Session sweeper stopping");
                break;
            }
            _ = ticker.tick() => {
                let evicted = provider.sweep(max_idle);
                debug!(evicted = evicted, "Session sweep finished");
            }
        }
    }
}
