use std::sync::Arc;

use crate::clock::Clock;
use crate::render::{Align, WHITE, YELLOW, write_text};
use crate::slide::{Cadence, Slide};
use crate::surface::Surface;

/// Weekday and date on the left half, 12-hour time on the right.
pub struct TimeSlide {
    clock: Arc<dyn Clock>,
}

impl TimeSlide {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Slide for TimeSlide {
    fn name(&self) -> &str {
        "time"
    }

    fn start_draw(&self) -> Cadence {
        Cadence::EVERY_SECOND
    }

    fn draw(&self, surface: &mut Surface) {
        let now = self.clock.now();
        let left = surface.width() as i32 / 4;
        let right = left * 3;
        let weekday = now.format("%A").to_string().to_uppercase();
        let date = now.format("%B %-d").to_string().to_uppercase();
        let time = now.format("%-I:%M %p").to_string();

        write_text(surface, &weekday, WHITE, Align::Center, left, 7);
        write_text(surface, &date, WHITE, Align::Center, left, 17);
        write_text(surface, &time, YELLOW, Align::Center, right, 12);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::FixedClock;

    #[test]
    fn draws_and_redraws_every_second() {
        let slide = TimeSlide::new(Arc::new(FixedClock::at_hms(2026, 10, 17, 21, 5, 0)));
        assert_eq!(slide.start_draw(), Cadence::EVERY_SECOND);
        assert!(slide.is_enabled());
        let mut surface = Surface::blank(128, 32);
        slide.draw(&mut surface);
        assert!(!surface.is_blank());
    }
}
