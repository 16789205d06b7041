pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod fetcher;
pub mod night_mode;
pub mod periodic;
pub mod render;
pub mod slide;
pub mod slides;
pub mod surface;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod tasks {
    pub mod controller;
    pub mod readiness;
    pub mod redraw;
    pub mod slideshow;
}
