use std::future::Future;

use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// When the first tick of a [`PeriodicTask`] fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstTick {
    Immediately,
    AfterPeriod,
}

/// A background task that runs `tick` on a fixed period until stopped.
///
/// A tick always runs to completion before the next one is considered, so a
/// slow tick delays the schedule instead of overlapping with itself. Each tick
/// receives the task's cancellation token so long waits inside it can bail out
/// early.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(
        name: &'static str,
        period: Duration,
        first: FirstTick,
        behavior: MissedTickBehavior,
        mut tick: F,
    ) -> Self
    where
        F: FnMut(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let start = match first {
                FirstTick::Immediately => Instant::now(),
                FirstTick::AfterPeriod => Instant::now() + period,
            };
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(behavior);
            loop {
                select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tick(token.clone()).await;
            }
        });
        Self {
            name,
            cancel,
            handle,
        }
    }

    /// Cancels the task and waits for it to exit. Once this returns the tick
    /// closure will not run again.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            if err.is_panic() {
                warn!(task = self.name, "periodic task panicked: {err}");
            }
        }
    }
}
