use crate::render::{AQUA, Align, YELLOW, write_text};
use crate::slide::{Cadence, Slide};
use crate::surface::Surface;

/// Shown while the show waits for connectivity and slide initialization.
#[derive(Debug, Clone)]
pub struct WelcomeSlide {
    title: String,
    subtitle: String,
}

impl WelcomeSlide {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
        }
    }
}

impl Slide for WelcomeSlide {
    fn name(&self) -> &str {
        "welcome"
    }

    fn start_draw(&self) -> Cadence {
        Cadence::Once
    }

    fn draw(&self, surface: &mut Surface) {
        let mid = surface.midpoint();
        write_text(surface, &self.title, YELLOW, Align::Center, mid, 2);
        write_text(surface, &self.subtitle, AQUA, Align::Center, mid, 16);
    }
}
