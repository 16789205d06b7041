use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use embedded_graphics::pixelcolor::Rgb888;
use rand::Rng;

use crate::clock::Clock;
use crate::render::{Align, GREEN, RED, YELLOW, fill_box, horizontal_line, outline_box, write_text};
use crate::slide::{Cadence, Slide};
use crate::surface::Surface;

/// Days before Christmas the slide starts appearing.
const LEAD_DAYS: i64 = 30;
const SECONDS_PER_DAY: i64 = 86_400;

/// Left and right edge of each row of the tree, top to bottom.
const TREE: [(i32, i32); 25] = [
    (10, 10),
    (9, 11),
    (9, 11),
    (8, 12),
    (8, 12),
    (8, 12),
    (7, 13),
    (7, 13),
    (6, 14),
    (6, 14),
    (6, 14),
    (5, 15),
    (5, 15),
    (4, 16),
    (4, 16),
    (4, 16),
    (3, 17),
    (3, 17),
    (2, 18),
    (2, 18),
    (2, 18),
    (1, 19),
    (1, 19),
    (0, 20),
    (0, 20),
];

const TREE_X: i32 = 18;
const TREE_Y: i32 = 2;
const COUNTER_X: i32 = 82;

const DARK_GREEN: Rgb888 = Rgb888::new(0, 128, 0);
const BROWN: Rgb888 = Rgb888::new(255, 128, 0);
const LIGHTS: [Rgb888; 10] = [
    Rgb888::new(0, 255, 255),
    Rgb888::new(0, 255, 255),
    Rgb888::new(255, 0, 0),
    Rgb888::new(255, 0, 0),
    Rgb888::new(0, 255, 0),
    Rgb888::new(0, 255, 0),
    Rgb888::new(0, 0, 255),
    Rgb888::new(0, 0, 255),
    Rgb888::new(255, 220, 0),
    Rgb888::new(255, 220, 0),
];

/// Tree with twinkling lights and the number of days left until Dec 25.
pub struct ChristmasSlide {
    clock: Arc<dyn Clock>,
}

impl ChristmasSlide {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

/// Whole days until Christmas of `now`'s year, rounded up. Christmas day
/// itself is zero and later days are negative.
pub fn days_until_christmas(now: &DateTime<FixedOffset>) -> i64 {
    let Some(christmas) = NaiveDate::from_ymd_opt(now.year(), 12, 25)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    else {
        return i64::MIN;
    };
    let seconds = (christmas - now.naive_local()).num_seconds();
    if seconds > 0 {
        (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
    } else {
        seconds / SECONDS_PER_DAY
    }
}

/// Random point strictly inside the tree, skipping the top row. Gives up
/// after a bounded number of tries.
fn random_light(rng: &mut impl Rng) -> Option<(i32, i32)> {
    (0..64).find_map(|_| {
        let x = rng.random_range(0..21);
        let y = rng.random_range(1..TREE.len() as i32);
        let (left, right) = TREE[y as usize];
        (x > left && x < right).then_some((x, y))
    })
}

impl Slide for ChristmasSlide {
    fn name(&self) -> &str {
        "christmas"
    }

    fn start_draw(&self) -> Cadence {
        Cadence::EVERY_SECOND
    }

    fn is_enabled(&self) -> bool {
        (0..=LEAD_DAYS).contains(&days_until_christmas(&self.clock.now()))
    }

    fn draw(&self, surface: &mut Surface) {
        surface.set_pixel(TREE_X + 10, TREE_Y - 1, YELLOW);
        for (row, &(left, right)) in TREE.iter().enumerate() {
            let y = TREE_Y + row as i32;
            horizontal_line(surface, DARK_GREEN, TREE_X + left, y, (right - left + 1) as u32);
        }
        fill_box(surface, BROWN, TREE_X + 9, TREE_Y + TREE.len() as i32, 3, 5);

        let mut rng = rand::rng();
        for color in LIGHTS {
            if let Some((x, y)) = random_light(&mut rng) {
                surface.set_pixel(TREE_X + x, TREE_Y + y, color);
            }
        }

        let days = days_until_christmas(&self.clock.now()).max(0);
        outline_box(surface, RED, COUNTER_X - 9, 1, 19, 13);
        write_text(surface, &days.to_string(), RED, Align::Center, COUNTER_X, 4);
        write_text(surface, "DAYS UNTIL", GREEN, Align::Center, COUNTER_X, 16);
        write_text(surface, "CHRISTMAS", GREEN, Align::Center, COUNTER_X, 24);
    }
}
