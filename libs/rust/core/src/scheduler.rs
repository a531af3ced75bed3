//! Fixed-cadence scheduling for the control loops.
//!
//! Ticks never overlap: the next tick fires one period after the previous
//! callback *completed*, so a slow tick never causes a catch-up burst.
//! Stopping is observed between ticks, which lets an in-flight callback run
//! to completion.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Cadence description. Construction schedules nothing; `start` does.
pub struct PeriodicScheduler {
    name: &'static str,
    period: Duration,
}

impl PeriodicScheduler {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self { name, period }
    }

    pub fn start<F, Fut>(self, mut tick: F) -> PeriodicTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let name = self.name;
        let period = self.period;
        let handle = tokio::spawn(async move {
            loop {
                tick().await;
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = stop_rx.changed() => {
                        debug!(task = name, "periodic task stopped");
                        break;
                    }
                }
            }
        });
        PeriodicTask { name, stop_tx, handle }
    }
}

/// Handle to a running loop.
pub struct PeriodicTask {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Cancel future ticks. An in-flight callback still runs to completion.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub async fn join(self) {
        let _ = self.handle.await;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
