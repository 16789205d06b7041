//! Rotation of slides on the display.
//!
//! Every transition happens under one async mutex, so the redraw task of the
//! outgoing slide is stopped and its `stop_draw` has returned before the
//! incoming slide's `start_draw` is called. Exactly one slide (configured,
//! welcome or idle) is current whenever the show is not stopped.

use std::sync::{Arc, Weak};

use tokio::select;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::ControlError;
use crate::periodic::{FirstTick, PeriodicTask};
use crate::slide::SharedSlide;
use crate::tasks::readiness::Readiness;
use crate::tasks::redraw::{RedrawTask, Renderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowPhase {
    Stopped,
    /// Welcome slide is up while the readiness barrier runs.
    Starting,
    Running,
    Stopping,
}

/// Which slide currently owns the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Welcome,
    Slide(usize),
    /// Fallback when no configured slide is enabled.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowStatus {
    pub phase: ShowPhase,
    pub frozen: bool,
    pub current: Option<Slot>,
}

/// Everything the slideshow needs, gathered by the caller.
pub struct SlideshowParts {
    pub slides: Vec<SharedSlide>,
    pub welcome: SharedSlide,
    pub idle: SharedSlide,
    pub renderer: Renderer,
    pub advance_interval: Duration,
    pub readiness: Readiness,
    /// Process-wide shutdown; cancelling it aborts a pending start.
    pub shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct Slideshow {
    inner: Arc<Inner>,
}

struct Inner {
    slides: Vec<SharedSlide>,
    welcome: SharedSlide,
    idle: SharedSlide,
    renderer: Renderer,
    advance_interval: Duration,
    readiness: Readiness,
    shutdown: CancellationToken,
    phase: watch::Sender<ShowPhase>,
    state: Mutex<ShowState>,
}

struct ShowState {
    phase: ShowPhase,
    frozen: bool,
    /// Index of the last configured slide shown; the next scan starts after it.
    cursor: Option<usize>,
    showing: Option<Showing>,
    advance: Option<PeriodicTask>,
}

struct Showing {
    slot: Slot,
    slide: SharedSlide,
    redraw: RedrawTask,
}

impl Slideshow {
    pub fn new(parts: SlideshowParts) -> Self {
        let (phase, _) = watch::channel(ShowPhase::Stopped);
        Self {
            inner: Arc::new(Inner {
                slides: parts.slides,
                welcome: parts.welcome,
                idle: parts.idle,
                renderer: parts.renderer,
                advance_interval: parts.advance_interval,
                readiness: parts.readiness,
                shutdown: parts.shutdown,
                phase,
                state: Mutex::new(ShowState {
                    phase: ShowPhase::Stopped,
                    frozen: false,
                    cursor: None,
                    showing: None,
                    advance: None,
                }),
            }),
        }
    }

    pub fn slide_count(&self) -> usize {
        self.inner.slides.len()
    }

    /// Shows the welcome slide and spawns the readiness barrier. The returned
    /// handle resolves once the show is running, or with
    /// [`ControlError::Cancelled`] if shutdown interrupted it.
    pub async fn launch(&self) -> Result<JoinHandle<Result<(), ControlError>>, ControlError> {
        let mut state = self.inner.state.lock().await;
        match state.phase {
            ShowPhase::Stopped => {}
            ShowPhase::Starting => return Err(ControlError::Starting),
            ShowPhase::Running => return Err(ControlError::AlreadyRunning),
            ShowPhase::Stopping => return Err(ControlError::Stopping),
        }
        self.set_phase(&mut state, ShowPhase::Starting);
        state.cursor = None;
        self.begin_showing(&mut state, Slot::Welcome);
        drop(state);
        info!(slides = self.inner.slides.len(), "slideshow starting");

        let show = self.clone();
        Ok(tokio::spawn(async move { show.run_startup().await }))
    }

    /// [`Slideshow::launch`] and wait for the readiness barrier to finish.
    pub async fn start(&self) -> Result<(), ControlError> {
        let startup = self.launch().await?;
        match startup.await {
            Ok(result) => result,
            Err(err) => {
                warn!("slideshow startup task failed: {err}");
                Err(ControlError::Cancelled)
            }
        }
    }

    /// Rotates to the next enabled slide.
    pub async fn advance(&self) -> Result<(), ControlError> {
        let mut state = self.inner.state.lock().await;
        if state.phase != ShowPhase::Running {
            return Err(ControlError::NotRunning);
        }
        self.advance_locked(&mut state).await;
        Ok(())
    }

    pub async fn freeze(&self) -> Result<(), ControlError> {
        let mut state = self.inner.state.lock().await;
        if state.frozen {
            return Err(ControlError::AlreadyFrozen);
        }
        state.frozen = true;
        info!("slideshow frozen");
        Ok(())
    }

    /// Clears the frozen flag and, if running, advances immediately.
    pub async fn unfreeze(&self) -> Result<(), ControlError> {
        let mut state = self.inner.state.lock().await;
        if !state.frozen {
            return Err(ControlError::NotFrozen);
        }
        state.frozen = false;
        info!("slideshow unfrozen");
        if state.phase == ShowPhase::Running {
            self.advance_locked(&mut state).await;
        }
        Ok(())
    }

    /// Stops the current slide and the advance loop, terminates every slide
    /// in list order and blanks the display.
    pub async fn stop(&self) -> Result<(), ControlError> {
        let advance = {
            let mut state = self.inner.state.lock().await;
            match state.phase {
                ShowPhase::Running => {}
                ShowPhase::Starting => return Err(ControlError::Starting),
                ShowPhase::Stopped | ShowPhase::Stopping => return Err(ControlError::NotRunning),
            }
            self.set_phase(&mut state, ShowPhase::Stopping);
            self.clear_showing(&mut state).await;
            state.advance.take()
        };
        // The advance tick takes the state lock, so it is stopped unlocked.
        if let Some(advance) = advance {
            advance.stop().await;
        }

        let mut state = self.inner.state.lock().await;
        self.terminate_slides(self.inner.slides.len()).await;
        state.cursor = None;
        self.inner.renderer.show_blank().await;
        self.set_phase(&mut state, ShowPhase::Stopped);
        info!("slideshow stopped");
        Ok(())
    }

    /// Cancels the shutdown token, waits out any transition in progress and
    /// stops the show if it is running.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let mut phases = self.inner.phase.subscribe();
        let _ = phases
            .wait_for(|phase| !matches!(phase, ShowPhase::Starting | ShowPhase::Stopping))
            .await;
        match self.stop().await {
            Ok(()) | Err(ControlError::NotRunning) => {}
            Err(err) => warn!("slideshow did not stop cleanly: {err}"),
        }
    }

    pub fn phase(&self) -> ShowPhase {
        *self.inner.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ShowPhase> {
        self.inner.phase.subscribe()
    }

    pub async fn status(&self) -> ShowStatus {
        let state = self.inner.state.lock().await;
        ShowStatus {
            phase: state.phase,
            frozen: state.frozen,
            current: state.showing.as_ref().map(|showing| showing.slot),
        }
    }

    /// Index of the configured slide on the display, if one is.
    pub async fn current_index(&self) -> Option<usize> {
        match self.status().await.current {
            Some(Slot::Slide(idx)) => Some(idx),
            _ => None,
        }
    }

    async fn run_startup(&self) -> Result<(), ControlError> {
        let inner = &self.inner;
        if inner
            .readiness
            .wait_for_connection(&inner.shutdown)
            .await
            .is_none()
        {
            return self.abort_startup(0).await;
        }
        select! {
            biased;
            _ = inner.shutdown.cancelled() => return self.abort_startup(0).await,
            _ = inner.readiness.sync_clock() => {}
        }

        for (idx, slide) in inner.slides.iter().enumerate() {
            select! {
                biased;
                // The interrupted slide may already own background work, so it
                // is terminated along with the ones before it.
                _ = inner.shutdown.cancelled() => return self.abort_startup(idx + 1).await,
                _ = slide.initialize() => {}
            }
            debug!(slide = slide.name(), "slide initialized");
        }

        let mut state = inner.state.lock().await;
        self.advance_locked(&mut state).await;
        state.advance = Some(self.spawn_advance_loop());
        self.set_phase(&mut state, ShowPhase::Running);
        info!(
            interval_secs = inner.advance_interval.as_secs_f64(),
            "slideshow running"
        );
        Ok(())
    }

    /// Terminates the first `begun` slides, the ones whose `initialize` was
    /// at least entered.
    async fn abort_startup(&self, begun: usize) -> Result<(), ControlError> {
        let mut state = self.inner.state.lock().await;
        self.clear_showing(&mut state).await;
        self.terminate_slides(begun).await;
        self.inner.renderer.show_blank().await;
        self.set_phase(&mut state, ShowPhase::Stopped);
        info!("slideshow start cancelled");
        Err(ControlError::Cancelled)
    }

    async fn terminate_slides(&self, count: usize) {
        for slide in self.inner.slides.iter().take(count) {
            slide.terminate().await;
            debug!(slide = slide.name(), "slide terminated");
        }
    }

    /// Scans forward from the slide after the cursor for the first enabled
    /// slide. A full pass without one falls back to the idle slide.
    async fn advance_locked(&self, state: &mut ShowState) {
        self.clear_showing(state).await;

        let slides = &self.inner.slides;
        let count = slides.len();
        let next = if count == 0 {
            None
        } else {
            let first = state.cursor.map_or(0, |cursor| (cursor + 1) % count);
            (0..count)
                .map(|offset| (first + offset) % count)
                .find(|&idx| slides[idx].is_enabled())
        };

        match next {
            Some(idx) => {
                state.cursor = Some(idx);
                self.begin_showing(state, Slot::Slide(idx));
            }
            None => {
                warn!(slides = count, "no enabled slides; showing idle slide");
                self.begin_showing(state, Slot::Idle);
            }
        }
    }

    async fn clear_showing(&self, state: &mut ShowState) {
        if let Some(showing) = state.showing.take() {
            showing.redraw.stop().await;
            showing.slide.stop_draw();
            trace!(slide = showing.slide.name(), "slide stopped drawing");
        }
    }

    fn begin_showing(&self, state: &mut ShowState, slot: Slot) {
        let slide = match slot {
            Slot::Welcome => self.inner.welcome.clone(),
            Slot::Idle => self.inner.idle.clone(),
            Slot::Slide(idx) => self.inner.slides[idx].clone(),
        };
        let cadence = slide.start_draw();
        debug!(slide = slide.name(), ?slot, "showing slide");
        let redraw = RedrawTask::spawn(slide.clone(), cadence, self.inner.renderer.clone());
        state.showing = Some(Showing {
            slot,
            slide,
            redraw,
        });
    }

    fn set_phase(&self, state: &mut ShowState, phase: ShowPhase) {
        state.phase = phase;
        self.inner.phase.send_replace(phase);
    }

    fn spawn_advance_loop(&self) -> PeriodicTask {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        PeriodicTask::spawn(
            "advance",
            self.inner.advance_interval,
            FirstTick::AfterPeriod,
            MissedTickBehavior::Delay,
            move |cancel| {
                let inner = inner.clone();
                async move {
                    let Some(inner) = inner.upgrade() else {
                        return;
                    };
                    let show = Slideshow { inner };
                    let mut state = select! {
                        _ = cancel.cancelled() => return,
                        state = show.inner.state.lock() => state,
                    };
                    if state.phase != ShowPhase::Running {
                        return;
                    }
                    if state.frozen {
                        trace!("advance skipped while frozen");
                        return;
                    }
                    show.advance_locked(&mut state).await;
                }
            },
        )
    }
}

impl std::fmt::Debug for Slideshow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slideshow")
            .field("slides", &self.inner.slides.len())
            .field("advance_interval", &self.inner.advance_interval)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
