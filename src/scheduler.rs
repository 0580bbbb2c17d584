//! Periodic refresh scheduler
//!
//! `start` fires one tick immediately and then every `interval`; `stop`
//! cancels the pending tick. A tick that is already running when `stop` is
//! called finishes normally, and no further tick follows it.

use crate::constants::REFRESH_INTERVAL_SECS;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

type TickFn = Box<dyn FnMut() -> BoxFuture<'static, ControlFlow<()>> + Send>;

struct Running {
    handle: JoinHandle<()>,
    stop: Arc<Notify>,
}

/// Fires refresh ticks on a fixed interval while enabled
///
/// Holds only the tick task and its stop signal. It never retries a tick;
/// a failed refresh simply waits for the next one.
pub struct SyncScheduler {
    interval: Duration,
    running: Option<Running>,
}

impl SyncScheduler {
    /// Creates a disabled scheduler
    ///
    /// # Arguments
    /// * `interval` - Period between ticks. A zero period is replaced with
    ///   the default refresh interval.
    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            tracing::warn!(
                refresh_interval_secs = REFRESH_INTERVAL_SECS,
                "Zero refresh interval, using the default"
            );
            Duration::from_secs(REFRESH_INTERVAL_SECS)
        } else {
            interval
        };
        Self {
            interval,
            running: None,
        }
    }

    /// Period between ticks
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True between `start` and `stop`, as long as the tick task is alive
    pub fn is_enabled(&self) -> bool {
        self.running
            .as_ref()
            .map(|running| !running.handle.is_finished())
            .unwrap_or(false)
    }

    /// Starts ticking. Returns false if already enabled.
    ///
    /// `tick` returning `ControlFlow::Break` ends the task, which is how a
    /// tick notices the thing it drives has gone away. Must be called from
    /// within a Tokio runtime.
    pub fn start<F, Fut>(&mut self, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if self.is_enabled() {
            return false;
        }

        let tick: TickFn = Box::new(move || tick().boxed());
        let stop = Arc::new(Notify::new());
        let handle = tokio::spawn(run_ticks(self.interval, tick, stop.clone()));
        self.running = Some(Running { handle, stop });

        tracing::info!(
            refresh_interval_secs = self.interval.as_secs(),
            "Auto-update scheduler started"
        );
        true
    }

    /// Cancels the pending tick. Returns false if already disabled.
    pub fn stop(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            return false;
        };
        let was_enabled = !running.handle.is_finished();
        running.stop.notify_one();
        if was_enabled {
            tracing::info!("Auto-update scheduler stopped");
        }
        was_enabled
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.stop.notify_one();
        }
    }
}

async fn run_ticks(period: Duration, mut tick: TickFn, stop: Arc<Notify>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // First tick completes immediately
        tokio::select! {
            biased;
            _ = stop.notified() => break,
            _ = interval.tick() => {}
        }
        if tick().await.is_break() {
            tracing::debug!("Scheduler target dropped, ending tick task");
            break;
        }
    }
}
