use std::sync::Arc;

use tokio::task;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::display::Display;
use crate::night_mode::NightModeGate;
use crate::periodic::{FirstTick, PeriodicTask};
use crate::slide::{Cadence, SharedSlide, Slide};
use crate::surface::Surface;

/// How often a draw-once slide re-checks the night-mode gate.
const GATE_POLL: Duration = Duration::from_secs(1);

/// Paints slides into a fresh surface and pushes the frame to the display,
/// substituting a blank frame while night mode is active.
#[derive(Clone)]
pub struct Renderer {
    display: Arc<dyn Display>,
    night: NightModeGate,
    width: u32,
    height: u32,
}

impl Renderer {
    pub fn new(display: Arc<dyn Display>, night: NightModeGate, width: u32, height: u32) -> Self {
        Self {
            display,
            night,
            width,
            height,
        }
    }

    pub fn night_mode_active(&self) -> bool {
        self.night.is_active()
    }

    /// Returns whether the slide was painted (false when night mode blanked it).
    pub async fn show(&self, slide: &dyn Slide) -> bool {
        if self.night.is_active() {
            self.show_blank().await;
            return false;
        }
        let mut surface = Surface::blank(self.width, self.height);
        slide.draw(&mut surface);
        self.push(surface).await;
        true
    }

    pub async fn show_blank(&self) {
        self.push(Surface::blank(self.width, self.height)).await;
    }

    /// Display sinks encode and write files, so frames are handed over on the
    /// blocking pool.
    async fn push(&self, surface: Surface) {
        let display = self.display.clone();
        if let Err(err) = task::spawn_blocking(move || display.redraw(&surface)).await {
            warn!("display redraw task failed: {err}");
        }
    }
}

/// Background repaint of the current slide at the cadence it asked for.
#[derive(Debug)]
pub struct RedrawTask {
    task: PeriodicTask,
}

impl RedrawTask {
    /// The first frame is painted immediately. Draw-once slides are repainted
    /// only when night mode switches on or off.
    pub fn spawn(slide: SharedSlide, cadence: Cadence, renderer: Renderer) -> Self {
        debug!(slide = slide.name(), ?cadence, "redraw task starting");
        let task = match cadence {
            Cadence::Every(period) => PeriodicTask::spawn(
                "redraw",
                period,
                FirstTick::Immediately,
                MissedTickBehavior::Skip,
                move |_| {
                    let slide = slide.clone();
                    let renderer = renderer.clone();
                    async move {
                        trace!(slide = slide.name(), "redraw tick");
                        renderer.show(slide.as_ref()).await;
                    }
                },
            ),
            Cadence::Once => {
                let mut night_shown: Option<bool> = None;
                PeriodicTask::spawn(
                    "redraw",
                    GATE_POLL,
                    FirstTick::Immediately,
                    MissedTickBehavior::Skip,
                    move |_| {
                        let night = renderer.night_mode_active();
                        let repaint = night_shown != Some(night);
                        night_shown = Some(night);
                        let slide = slide.clone();
                        let renderer = renderer.clone();
                        async move {
                            if !repaint {
                                return;
                            }
                            if night {
                                renderer.show_blank().await;
                            } else {
                                renderer.show(slide.as_ref()).await;
                            }
                        }
                    },
                )
            }
        };
        Self { task }
    }

    /// Waits for any in-progress frame; no frame is painted after this returns.
    pub async fn stop(self) {
        self.task.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{FixedClock, LifecycleLog, RecordingDisplay, ScriptedSlide};
    use config_model::NightModeConfig;

    #[tokio::test(start_paused = true)]
    async fn draw_once_slide_repaints_on_night_transition() {
        let clock = Arc::new(FixedClock::at_hms(2026, 3, 1, 22, 59, 58));
        let display = Arc::new(RecordingDisplay::new());
        let renderer = Renderer::new(
            display.clone(),
            NightModeGate::new(Some(NightModeConfig::new(23, 5)), clock.clone()),
            16,
            8,
        );
        let log = LifecycleLog::new();
        let slide: SharedSlide = Arc::new(ScriptedSlide::new("still", log.clone()));

        let task = RedrawTask::spawn(slide, Cadence::Once, renderer);
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(display.frame_count(), 1);
        assert!(!display.last_frame().unwrap().is_blank());

        clock.set_hms(2026, 3, 1, 23, 0, 0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(display.frame_count(), 2);
        assert!(display.last_frame().unwrap().is_blank());

        task.stop().await;
    }

    #[derive(Default)]
    struct ThreadRecordingDisplay {
        threads: parking_lot::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl Display for ThreadRecordingDisplay {
        fn redraw(&self, _surface: &Surface) {
            self.threads.lock().push(std::thread::current().id());
        }
    }

    #[tokio::test]
    async fn frames_are_written_off_the_runtime_thread() {
        let clock = Arc::new(FixedClock::at_hms(2026, 3, 1, 12, 0, 0));
        let display = Arc::new(ThreadRecordingDisplay::default());
        let renderer = Renderer::new(display.clone(), NightModeGate::disabled(clock), 16, 8);
        let slide = ScriptedSlide::new("still", LifecycleLog::new());

        assert!(renderer.show(&slide).await);
        renderer.show_blank().await;

        let threads = display.threads.lock().clone();
        assert_eq!(threads.len(), 2);
        let runtime_thread = std::thread::current().id();
        assert!(threads.iter().all(|id| *id != runtime_thread));
    }

    #[tokio::test(start_paused = true)]
    async fn animated_slide_repaints_every_period() {
        let clock = Arc::new(FixedClock::at_hms(2026, 3, 1, 12, 0, 0));
        let display = Arc::new(RecordingDisplay::new());
        let renderer = Renderer::new(display.clone(), NightModeGate::disabled(clock), 16, 8);
        let slide: SharedSlide = Arc::new(ScriptedSlide::new("anim", LifecycleLog::new()));

        let task = RedrawTask::spawn(slide, Cadence::Every(Duration::from_millis(250)), renderer);
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        task.stop().await;
        let frames = display.frame_count();
        assert_eq!(frames, 5);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(display.frame_count(), frames);
    }
}
