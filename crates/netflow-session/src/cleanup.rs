//! Background task that periodically sweeps a [`SessionMap`].

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::SessionMap;

/// Interval used in place of a zero interval, which tokio cannot tick on.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(1);

/// Sweep `map` every `interval` until `cancel` fires.
///
/// The first sweep happens one full interval after the loop starts. Counts
/// are logged only for passes that removed something. Cancellation is only
/// observed between sweeps, so a pass is never left half applied. A zero
/// `interval` is replaced by [`MIN_CLEANUP_INTERVAL`]; any other value is
/// used as given.
pub async fn cleanup_loop<T>(map: SessionMap<T>, interval: Duration, cancel: CancellationToken) {
    let interval = if interval.is_zero() {
        warn!(using = ?MIN_CLEANUP_INTERVAL, "Zero cleanup interval, clamping");
        MIN_CLEANUP_INTERVAL
    } else {
        interval
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    debug!(interval = ?interval, "Session cleanup loop started");
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let stats = map.cleanup();
                if stats.has_removals() {
                    debug!(
                        sessions_removed = stats.sessions_removed,
                        sessions_alive = stats.sessions_alive,
                        templates_removed = stats.templates_removed,
                        templates_alive = stats.templates_alive,
                        "Expired {}",
                        stats
                    );
                }
            }
        }
    }
    debug!("Session cleanup loop stopped");
}

/// Handle to a spawned cleanup loop.
#[derive(Debug)]
pub struct CleanupHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Token that stops the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Session cleanup task did not exit cleanly");
        }
    }
}

/// Spawn [`cleanup_loop`] on the current tokio runtime.
///
/// The loop stops when `cancel` (or any parent token) is cancelled, or when
/// [`CleanupHandle::shutdown`] is called.
pub fn spawn_cleanup<T>(
    map: SessionMap<T>,
    interval: Duration,
    cancel: CancellationToken,
) -> CleanupHandle
where
    T: Send + Sync + 'static,
{
    let task = tokio::spawn(cleanup_loop(map, interval, cancel.clone()));
    CleanupHandle { cancel, task }
}
