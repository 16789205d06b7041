use std::sync::Arc;

use futures::future::{BoxFuture, ready};
use tokio::time::Duration;

use crate::surface::Surface;

/// How often the scheduler repaints the current slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Paint once when the slide becomes current.
    Once,
    Every(Duration),
}

impl Cadence {
    pub const EVERY_SECOND: Cadence = Cadence::Every(Duration::from_secs(1));
}

/// A unit of displayable content with its own lifecycle.
///
/// The scheduler calls `initialize` once before first use and `terminate`
/// once at shutdown. `start_draw` and `stop_draw` bracket the time the slide
/// is visible; `draw` is only called between them, and must produce a defined
/// placeholder when the slide has no data yet.
pub trait Slide: Send + Sync {
    fn name(&self) -> &str;

    /// May block on a first fetch so the slide has content before it is shown.
    fn initialize(&self) -> BoxFuture<'_, ()> {
        Box::pin(ready(()))
    }

    /// Releases every background task the slide owns.
    fn terminate(&self) -> BoxFuture<'_, ()> {
        Box::pin(ready(()))
    }

    fn start_draw(&self) -> Cadence;

    fn stop_draw(&self) {}

    /// Whether the slide takes part in the current rotation pass. Reads state
    /// only.
    fn is_enabled(&self) -> bool {
        true
    }

    fn draw(&self, surface: &mut Surface);
}

pub type SharedSlide = Arc<dyn Slide>;
