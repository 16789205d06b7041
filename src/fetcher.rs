//! Periodic refresh of one remote resource on behalf of a slide.
//!
//! A [`Fetcher`] owns a request source, a parse callback and an optional
//! refresh loop. Every cycle, whether started by the loop or by a direct
//! [`Fetcher::fetch`] call, runs under the same single-flight lock, and its
//! outcome is published to a `watch` channel in one send so readers never see
//! a success flag paired with an older body.

mod debug_sink;
mod transport;

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::select;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{FetchError, FetcherError};
use crate::periodic::{FirstTick, PeriodicTask};

pub use debug_sink::{DebugSink, DirectoryDebugSink};
pub use transport::{HttpTransport, RequestSource, StaticUrl, Transport};

/// Shared collaborators every fetcher in the process uses.
#[derive(Clone)]
pub struct FetchContext {
    pub transport: Arc<dyn Transport>,
    pub debug_sink: Option<Arc<dyn DebugSink>>,
}

impl FetchContext {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            debug_sink: None,
        }
    }

    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }
}

impl fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchContext")
            .field("debug_sink", &self.debug_sink.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub id: String,
    pub refresh_interval: Duration,
}

impl FetcherConfig {
    pub fn new(id: impl Into<String>, refresh_interval: Duration) -> Self {
        Self {
            id: id.into(),
            refresh_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// No cycle has completed yet.
    Pending,
    Succeeded,
    Failed,
}

/// State after the most recent completed fetch cycle.
#[derive(Debug, Clone)]
pub struct FetchSnapshot {
    pub outcome: FetchOutcome,
    /// Body of the last cycle the parser accepted. Failed cycles keep it.
    pub body: Option<Arc<[u8]>>,
    pub fetched_at: Option<Instant>,
    pub consecutive_failures: u32,
    pub attempts: u64,
}

impl FetchSnapshot {
    fn pending() -> Self {
        Self {
            outcome: FetchOutcome::Pending,
            body: None,
            fetched_at: None,
            consecutive_failures: 0,
            attempts: 0,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == FetchOutcome::Succeeded
    }
}

type ParseFn = Box<dyn Fn(&[u8]) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Fetcher {
    inner: Arc<Inner>,
}

struct Inner {
    id: String,
    refresh_interval: Duration,
    request: Box<dyn RequestSource>,
    parse: ParseFn,
    context: FetchContext,
    in_flight: AsyncMutex<()>,
    state: watch::Sender<FetchSnapshot>,
    refresh_loop: Mutex<Option<PeriodicTask>>,
}

impl Fetcher {
    /// `parse` receives each successful body. Returning `false` marks the cycle
    /// failed and the callback must leave its own state untouched.
    pub fn new<R, P>(config: FetcherConfig, request: R, parse: P, context: FetchContext) -> Self
    where
        R: RequestSource + 'static,
        P: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        let (state, _) = watch::channel(FetchSnapshot::pending());
        Self {
            inner: Arc::new(Inner {
                id: config.id,
                refresh_interval: config.refresh_interval,
                request: Box::new(request),
                parse: Box::new(parse),
                context,
                in_flight: AsyncMutex::new(()),
                state,
                refresh_loop: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn refresh_interval(&self) -> Duration {
        self.inner.refresh_interval
    }

    /// Starts the refresh loop and performs one fetch before returning, so the
    /// result is already visible to the caller. Returns that fetch's outcome.
    pub async fn start(&self) -> Result<bool, FetcherError> {
        {
            let mut slot = self.inner.refresh_loop.lock();
            if slot.is_some() {
                warn!(fetcher = %self.inner.id, "refresh loop already started");
                return Err(FetcherError::AlreadyStarted(self.inner.id.clone()));
            }
            *slot = Some(self.spawn_refresh_loop());
        }
        info!(
            fetcher = %self.inner.id,
            interval_secs = self.inner.refresh_interval.as_secs_f64(),
            "refresh loop started"
        );
        Ok(self.fetch().await)
    }

    /// Cancels the refresh loop and waits for it to exit. The last outcome is
    /// retained.
    pub async fn stop(&self) -> Result<(), FetcherError> {
        let task = self.inner.refresh_loop.lock().take();
        match task {
            Some(task) => {
                task.stop().await;
                info!(fetcher = %self.inner.id, "refresh loop stopped");
                Ok(())
            }
            None => {
                warn!(fetcher = %self.inner.id, "refresh loop was not started");
                Err(FetcherError::NotStarted(self.inner.id.clone()))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.refresh_loop.lock().is_some()
    }

    /// Runs one fetch cycle, waiting for any cycle already in flight.
    pub async fn fetch(&self) -> bool {
        self.inner.fetch().await
    }

    pub fn last_fetch_success(&self) -> bool {
        self.inner.state.borrow().succeeded()
    }

    /// Whether any cycle has ever succeeded. Stays true across later failures.
    pub fn has_loaded(&self) -> bool {
        self.inner.state.borrow().body.is_some()
    }

    pub fn outcome(&self) -> FetchOutcome {
        self.inner.state.borrow().outcome
    }

    pub fn snapshot(&self) -> FetchSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchSnapshot> {
        self.inner.state.subscribe()
    }

    fn spawn_refresh_loop(&self) -> PeriodicTask {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        PeriodicTask::spawn(
            "fetcher",
            self.inner.refresh_interval,
            FirstTick::AfterPeriod,
            MissedTickBehavior::Delay,
            move |cancel| {
                let inner = inner.clone();
                async move {
                    let Some(inner) = inner.upgrade() else {
                        return;
                    };
                    select! {
                        _ = cancel.cancelled() => {}
                        _ = inner.fetch() => {}
                    }
                }
            },
        )
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("id", &self.inner.id)
            .field("refresh_interval", &self.inner.refresh_interval)
            .field("outcome", &self.outcome())
            .finish_non_exhaustive()
    }
}

impl Inner {
    async fn fetch(&self) -> bool {
        let _in_flight = self.in_flight.lock().await;
        let result = self.fetch_once().await;
        let succeeded = result.is_ok();
        self.state.send_modify(|snapshot| {
            snapshot.attempts += 1;
            match result {
                Ok(body) => {
                    snapshot.outcome = FetchOutcome::Succeeded;
                    snapshot.body = Some(body);
                    snapshot.fetched_at = Some(Instant::now());
                    snapshot.consecutive_failures = 0;
                }
                Err(ref err) => {
                    snapshot.outcome = FetchOutcome::Failed;
                    snapshot.consecutive_failures += 1;
                    warn!(
                        fetcher = %self.id,
                        failures = snapshot.consecutive_failures,
                        "fetch failed: {err}"
                    );
                }
            }
        });
        succeeded
    }

    async fn fetch_once(&self) -> Result<Arc<[u8]>, FetchError> {
        let request = self
            .request
            .build_request()
            .map_err(FetchError::Request)?;
        debug!(fetcher = %self.id, url = %request.url(), "fetching");
        let body: Arc<[u8]> = Arc::from(self.context.transport.execute(request).await?);
        if let Some(sink) = self.context.debug_sink.clone() {
            let id = self.id.clone();
            let raw = body.clone();
            // Sinks write files; keep that off the runtime threads.
            if let Err(err) = task::spawn_blocking(move || sink.record(&id, &raw)).await {
                warn!(fetcher = %self.id, "debug sink task failed: {err}");
            }
        }
        if (self.parse)(&body[..]) {
            Ok(body)
        } else {
            Err(FetchError::Rejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ScriptedTransport;

    fn fetcher(transport: Arc<ScriptedTransport>) -> Fetcher {
        Fetcher::new(
            FetcherConfig::new("unit", Duration::from_secs(60)),
            StaticUrl::parse("http://localhost/data").unwrap(),
            |body: &[u8]| body != b"bad",
            FetchContext::new(transport),
        )
    }

    #[derive(Default)]
    struct ThreadSink {
        writes: Mutex<Vec<(String, std::thread::ThreadId)>>,
    }

    impl DebugSink for ThreadSink {
        fn record(&self, fetcher: &str, _body: &[u8]) {
            self.writes
                .lock()
                .push((fetcher.to_owned(), std::thread::current().id()));
        }
    }

    #[tokio::test]
    async fn debug_sink_runs_on_the_blocking_pool() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(b"good".to_vec());
        let sink = Arc::new(ThreadSink::default());
        let fetcher = Fetcher::new(
            FetcherConfig::new("unit", Duration::from_secs(60)),
            StaticUrl::parse("http://localhost/data").unwrap(),
            |_: &[u8]| true,
            FetchContext::new(transport).with_debug_sink(sink.clone()),
        );

        assert!(fetcher.fetch().await);
        let writes = sink.writes.lock().clone();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "unit");
        assert_ne!(writes[0].1, std::thread::current().id());
    }

    #[tokio::test]
    async fn failed_cycle_keeps_last_good_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(b"good".to_vec());
        transport.push_ok(b"bad".to_vec());
        let fetcher = fetcher(transport.clone());

        assert_eq!(fetcher.outcome(), FetchOutcome::Pending);
        assert!(fetcher.fetch().await);
        assert!(!fetcher.fetch().await);

        let snapshot = fetcher.snapshot();
        assert_eq!(snapshot.outcome, FetchOutcome::Failed);
        assert_eq!(snapshot.body.as_deref(), Some(&b"good"[..]));
        assert_eq!(snapshot.consecutive_failures, 1);
        assert_eq!(snapshot.attempts, 2);
    }

    #[tokio::test]
    async fn status_errors_count_as_failures() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(503);
        transport.push_ok(b"good".to_vec());
        let fetcher = fetcher(transport);

        assert!(!fetcher.fetch().await);
        assert!(!fetcher.last_fetch_success());
        assert!(fetcher.fetch().await);
        assert_eq!(fetcher.snapshot().consecutive_failures, 0);
    }
}
