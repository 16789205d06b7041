use std::sync::Arc;

use chrono::Timelike;
use config_model::NightModeConfig;

use crate::clock::Clock;

/// True when `now` falls inside the quiet window `[start, end)`.
///
/// `start > end` wraps past midnight. `start == end` is an empty window.
pub fn in_night_mode<T: Timelike>(now: &T, start: u32, end: u32) -> bool {
    let hour = now.hour();
    if start <= end {
        (start..end).contains(&hour)
    } else {
        hour >= start || hour < end
    }
}

/// Night-mode window bound to a clock, consulted on every redraw tick.
#[derive(Clone)]
pub struct NightModeGate {
    window: Option<NightModeConfig>,
    clock: Arc<dyn Clock>,
}

impl NightModeGate {
    pub fn new(window: Option<NightModeConfig>, clock: Arc<dyn Clock>) -> Self {
        Self { window, clock }
    }

    pub fn disabled(clock: Arc<dyn Clock>) -> Self {
        Self::new(None, clock)
    }

    pub fn is_active(&self) -> bool {
        self.window.is_some_and(|window| {
            in_night_mode(&self.clock.now(), window.start_hour, window.end_hour)
        })
    }
}

impl std::fmt::Debug for NightModeGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NightModeGate")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
