//! In-memory doubles for the clock, display, network and slides. Used by the
//! unit tests and by the integration tests under `tests/`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use chrono::{DateTime, FixedOffset, NaiveDate};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use reqwest::Request;
use tokio::time::{Duration, sleep};

use crate::clock::Clock;
use crate::display::Display;
use crate::error::FetchError;
use crate::fetcher::Transport;
use crate::render::{WHITE, fill_box};
use crate::slide::{Cadence, Slide};
use crate::surface::Surface;
use crate::tasks::readiness::ConnectivityProbe;

/// Clock frozen at a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

fn utc_datetime(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<FixedOffset> {
    NaiveDate::from_ymd_opt(y, mo, d)
        .and_then(|date| date.and_hms_opt(h, mi, s))
        .expect("valid test date")
        .and_utc()
        .fixed_offset()
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// UTC wall time. Panics on an impossible date.
    pub fn at_hms(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Self {
        Self::new(utc_datetime(y, mo, d, h, mi, s))
    }

    pub fn at_rfc3339(stamp: &str) -> Self {
        Self::new(DateTime::parse_from_rfc3339(stamp).expect("valid rfc3339 timestamp"))
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock() = now;
    }

    pub fn set_hms(&self, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) {
        self.set(utc_datetime(y, mo, d, h, mi, s));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock()
    }
}

/// Keeps every frame it is handed.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    frames: Mutex<Vec<Surface>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn last_frame(&self) -> Option<Surface> {
        self.frames.lock().last().cloned()
    }

    pub fn frames(&self) -> Vec<Surface> {
        self.frames.lock().clone()
    }
}

impl Display for RecordingDisplay {
    fn redraw(&self, surface: &Surface) {
        self.frames.lock().push(surface.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Initialized(String),
    Terminated(String),
    Started(String),
    Stopped(String),
    Drawn(String),
}

/// Shared, ordered record of slide lifecycle calls.
#[derive(Debug, Clone, Default)]
pub struct LifecycleLog {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl LifecycleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: LifecycleEvent) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    /// Everything except draws, which are too timing dependent to compare.
    pub fn transitions(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| !matches!(event, LifecycleEvent::Drawn(_)))
            .cloned()
            .collect()
    }

    pub fn count(&self, event: &LifecycleEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// Slide that logs each lifecycle call and fills the surface when drawn.
#[derive(Debug)]
pub struct ScriptedSlide {
    name: String,
    log: LifecycleLog,
    enabled: AtomicBool,
    cadence: Mutex<Cadence>,
    init_delay: Duration,
    init_hangs: bool,
}

impl ScriptedSlide {
    pub fn new(name: &str, log: LifecycleLog) -> Self {
        Self {
            name: name.to_owned(),
            log,
            enabled: AtomicBool::new(true),
            cadence: Mutex::new(Cadence::Once),
            init_delay: Duration::ZERO,
            init_hangs: false,
        }
    }

    pub fn with_cadence(self, cadence: Cadence) -> Self {
        *self.cadence.lock() = cadence;
        self
    }

    /// Makes `initialize` take this long, like a slow first fetch.
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Makes `initialize` never finish, like a fetch against a host that
    /// never answers.
    pub fn with_hanging_init(mut self) -> Self {
        self.init_hangs = true;
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl Slide for ScriptedSlide {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.init_hangs {
                futures::future::pending::<()>().await;
            }
            if !self.init_delay.is_zero() {
                sleep(self.init_delay).await;
            }
            self.log
                .record(LifecycleEvent::Initialized(self.name.clone()));
        })
    }

    fn terminate(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.log.record(LifecycleEvent::Terminated(self.name.clone()));
        })
    }

    fn start_draw(&self) -> Cadence {
        self.log.record(LifecycleEvent::Started(self.name.clone()));
        *self.cadence.lock()
    }

    fn stop_draw(&self) {
        self.log.record(LifecycleEvent::Stopped(self.name.clone()));
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn draw(&self, surface: &mut Surface) {
        self.log.record(LifecycleEvent::Drawn(self.name.clone()));
        fill_box(surface, WHITE, 0, 0, surface.width(), surface.height());
    }
}

#[derive(Debug)]
enum Scripted {
    Body(Vec<u8>),
    Status(u16),
}

/// Replays queued responses in order. An empty queue behaves like an
/// unreachable host.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Scripted>>,
    urls: Mutex<Vec<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every response arrives after this much (tokio) time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push_ok(&self, body: Vec<u8>) {
        self.responses.lock().push_back(Scripted::Body(body));
    }

    pub fn push_status(&self, status: u16) {
        self.responses.lock().push_back(Scripted::Status(status));
    }

    pub fn calls(&self) -> usize {
        self.urls.lock().len()
    }

    /// Highest number of requests that were in flight at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: Request) -> BoxFuture<'_, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            self.urls.lock().push(request.url().to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            let next = self.responses.lock().pop_front();
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match next {
                Some(Scripted::Body(body)) => Ok(body),
                Some(Scripted::Status(status)) => Err(FetchError::Status(status)),
                None => Err(FetchError::Transport("no scripted response".into())),
            }
        })
    }
}

/// Always answers the same.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

impl ConnectivityProbe for StaticProbe {
    fn is_connected(&self) -> BoxFuture<'_, bool> {
        Box::pin(futures::future::ready(self.0))
    }
}

/// Reports disconnected for the first `n` checks, then connected.
#[derive(Debug)]
pub struct FlakyProbe {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyProbe {
    pub fn failing_first(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConnectivityProbe for FlakyProbe {
    fn is_connected(&self) -> BoxFuture<'_, bool> {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(futures::future::ready(previous >= self.failures))
    }
}
