use crate::render::{Align, DIM, write_small_text};
use crate::slide::{Cadence, Slide};
use crate::surface::Surface;

/// Fallback shown when a rotation pass finds no enabled slide.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleSlide;

impl Slide for IdleSlide {
    fn name(&self) -> &str {
        "idle"
    }

    fn start_draw(&self) -> Cadence {
        Cadence::Once
    }

    fn draw(&self, surface: &mut Surface) {
        let mid = surface.midpoint();
        let y = (surface.height() as i32 - 6) / 2;
        write_small_text(surface, "STANDBY", DIM, Align::Center, mid, y);
    }
}
