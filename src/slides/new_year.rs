use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use embedded_graphics::pixelcolor::Rgb888;
use parking_lot::Mutex;
use tokio::time::Duration;

use crate::clock::Clock;
use crate::render::{AQUA, Align, GREEN, WHITE, YELLOW, write_text};
use crate::slide::{Cadence, Slide};
use crate::surface::Surface;

const FRAMES_PER_SECOND: f32 = 4.0;
const GRAVITY: f32 = 0.4 / FRAMES_PER_SECOND;
const FRICTION: f32 = 0.96;
const LAUNCH_SPEED: f32 = -7.5;

/// Countdown to midnight on January 1st with fireworks.
pub struct NewYearSlide {
    clock: Arc<dyn Clock>,
    fireworks: Mutex<Vec<Firework>>,
}

impl NewYearSlide {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            fireworks: Mutex::new(Vec::new()),
        }
    }
}

/// Next New Year's midnight. During January this is the one that just passed.
pub fn target_midnight(now: &NaiveDateTime) -> NaiveDateTime {
    let year = if now.month() == 1 {
        now.year()
    } else {
        now.year() + 1
    };
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(*now)
}

/// The slide shows during the last day of the year and the first hour of
/// the new one.
fn in_window(now: &DateTime<FixedOffset>) -> bool {
    let local = now.naive_local();
    let remaining = target_midnight(&local) - local;
    remaining > -TimeDelta::hours(1) && remaining <= TimeDelta::days(1)
}

fn format_remaining(remaining: TimeDelta) -> String {
    let total = remaining.num_seconds().max(0);
    format!(
        "{:02} : {:02} : {:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}

impl Slide for NewYearSlide {
    fn name(&self) -> &str {
        "new-year"
    }

    fn start_draw(&self) -> Cadence {
        *self.fireworks.lock() = vec![
            Firework::launch(10, 8, Rgb888::new(255, 0, 0), 32),
            Firework::launch(27, 12, Rgb888::new(255, 255, 0), 32),
            Firework::launch(112, 6, Rgb888::new(0, 255, 255), 32),
            Firework::launch(103, 10, Rgb888::new(255, 0, 255), 32),
        ];
        Cadence::Every(Duration::from_secs_f32(1.0 / FRAMES_PER_SECOND))
    }

    fn stop_draw(&self) {
        self.fireworks.lock().clear();
    }

    fn is_enabled(&self) -> bool {
        in_window(&self.clock.now())
    }

    fn draw(&self, surface: &mut Surface) {
        let now = self.clock.now().naive_local();
        let target = target_midnight(&now);
        let mid = surface.midpoint();
        write_text(surface, &format_remaining(target - now), AQUA, Align::Center, mid, 4);
        write_text(surface, "UNTIL", WHITE, Align::Center, mid, 14);
        write_text(surface, &target.year().to_string(), GREEN, Align::Center, mid - 1, 23);

        for firework in self.fireworks.lock().iter_mut() {
            firework.step();
            firework.draw(surface);
        }
    }
}

#[derive(Debug, Clone)]
struct Ember {
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
    color: Rgb888,
}

impl Ember {
    fn step(&mut self) {
        self.x += self.dx;
        self.y += self.dy;
        self.dy += GRAVITY;
        self.dx *= FRICTION;
    }
}

/// A rocket that climbs to its burst point, then explodes into rings.
#[derive(Debug, Clone)]
struct Firework {
    x: i32,
    y: i32,
    color: Rgb888,
    burst: bool,
    embers: Vec<Ember>,
}

impl Firework {
    fn launch(x: i32, y: i32, color: Rgb888, screen_height: i32) -> Self {
        Self {
            x,
            y,
            color,
            burst: false,
            embers: vec![Ember {
                x: x as f32,
                y: (y + screen_height) as f32,
                dx: 0.0,
                dy: LAUNCH_SPEED,
                color: YELLOW,
            }],
        }
    }

    fn step(&mut self) {
        self.embers.iter_mut().for_each(Ember::step);
        let reached = self
            .embers
            .first()
            .is_some_and(|rocket| rocket.y as i32 <= self.y);
        if !self.burst && reached {
            self.burst = true;
            self.explode();
        }
    }

    fn explode(&mut self) {
        self.embers.clear();
        for ring in 1..=4 {
            let speed = ring as f32 * 0.4;
            let count = if ring == 1 { 8 } else { 16 };
            for i in 0..count {
                let angle = (i as f32 / (count as f32 / 2.0)) * std::f32::consts::PI;
                self.embers.push(Ember {
                    x: self.x as f32,
                    y: self.y as f32,
                    dx: angle.sin() * speed,
                    dy: angle.cos() * speed,
                    color: self.color,
                });
            }
        }
    }

    fn draw(&self, surface: &mut Surface) {
        for ember in &self.embers {
            surface.set_pixel(ember.x.round() as i32, ember.y.round() as i32, ember.color);
        }
    }
}
