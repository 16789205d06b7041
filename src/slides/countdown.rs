use std::sync::Arc;

use chrono::NaiveDate;
use embedded_graphics::pixelcolor::Rgb888;

use crate::clock::Clock;
use crate::render::{Align, WHITE, write_text};
use crate::slide::{Cadence, Slide};
use crate::surface::Surface;

const MAX_ROWS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct CountdownEvent {
    pub date: NaiveDate,
    pub label: String,
    pub color: Rgb888,
}

/// Days remaining until each upcoming event, one event per line.
pub struct CountdownSlide {
    events: Vec<CountdownEvent>,
    clock: Arc<dyn Clock>,
}

impl CountdownSlide {
    pub fn new(events: Vec<CountdownEvent>, clock: Arc<dyn Clock>) -> Self {
        Self { events, clock }
    }

    /// Events dated today or later, in configured order, at most four.
    pub fn upcoming(&self, today: NaiveDate) -> Vec<&CountdownEvent> {
        self.events
            .iter()
            .filter(|event| event.date >= today)
            .take(MAX_ROWS)
            .collect()
    }
}

impl Slide for CountdownSlide {
    fn name(&self) -> &str {
        "countdown"
    }

    fn start_draw(&self) -> Cadence {
        Cadence::Once
    }

    fn is_enabled(&self) -> bool {
        !self.upcoming(self.clock.now().date_naive()).is_empty()
    }

    fn draw(&self, surface: &mut Surface) {
        let today = self.clock.now().date_naive();
        let upcoming = self.upcoming(today);
        let rows: &[i32] = match upcoming.len() {
            1 => &[13],
            2 => &[6, 19],
            3 => &[3, 13, 23],
            _ => &[0, 8, 16, 24],
        };
        for (event, &y) in upcoming.iter().zip(rows) {
            let days = (event.date - today).num_days();
            write_text(surface, &days.to_string(), WHITE, Align::Right, 20, y);
            write_text(surface, &event.label, event.color, Align::Left, 26, y);
        }
    }
}
