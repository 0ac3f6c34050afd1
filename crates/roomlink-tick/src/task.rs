use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::{TickConfig, TickInfo, Ticker};

/// A spawned loop that runs a job on every tick of a [`Ticker`].
///
/// The loop is aborted when the handle is dropped. A job already in
/// flight is cancelled at its next `.await`.
#[must_use = "dropping a PeriodicTask stops it immediately"]
pub struct PeriodicTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(name: &'static str, config: TickConfig, mut job: F) -> Self
    where
        F: FnMut(TickInfo) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, period = ?config.period, "periodic task started");
        let handle = tokio::spawn(async move {
            let mut ticker = Ticker::new(config);
            loop {
                let info = ticker.wait_for_tick().await;
                trace!(task = name, tick = info.tick, "periodic task running");
                job(info).await;
            }
        });
        Self { name, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the loop. Same as dropping the handle.
    pub fn stop(self) {}
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.handle.abort();
        debug!(task = self.name, "periodic task stopped");
    }
}

/// A job that runs once after a delay unless the handle is dropped first.
#[must_use = "dropping a Countdown cancels it immediately"]
pub struct Countdown {
    handle: JoinHandle<()>,
}

impl Countdown {
    pub fn spawn<F, Fut>(delay: Duration, job: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job().await;
        });
        Self { handle }
    }

    /// `true` once the job has run to completion (or was cancelled).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {}
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
