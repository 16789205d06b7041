//! Shared pieces of the vaccination and case-count slides: a per-region
//! series of cumulative daily totals and the row that draws it.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use embedded_graphics::pixelcolor::Rgb888;

use crate::config::RegionConfig;
use crate::render::{Align, GRAY, WHITE, draw_bar_graph, write_text};
use crate::surface::Surface;

/// Days of history kept. One more than the number of graphed days since each
/// bar is the difference between two totals.
pub const HISTORY_DAYS: u64 = 29;
const GRAPH_HEIGHT: u32 = 7;

/// Cumulative totals for one region, keyed by report date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySeries {
    pub name: String,
    pub label: String,
    pub totals: BTreeMap<NaiveDate, u64>,
}

impl DailySeries {
    pub fn new(region: &RegionConfig) -> Self {
        Self {
            name: region.name.clone(),
            label: region.label.clone(),
            totals: BTreeMap::new(),
        }
    }

    /// Daily increases for the graphed days, oldest first, ending yesterday.
    /// A day without a total, or without an earlier total to compare with,
    /// counts as zero. Gaps are bridged with the last total seen.
    pub fn daily_increases(&self, today: NaiveDate) -> Vec<u64> {
        let mut last: Option<u64> = None;
        (1..HISTORY_DAYS)
            .rev()
            .map(|offset| {
                let day = today - Days::new(offset);
                if let Some(previous) = self.totals.get(&(day - Days::new(1))) {
                    last = Some(*previous);
                }
                match (self.totals.get(&day), last) {
                    (Some(total), Some(before)) if before > 0 => total.saturating_sub(before),
                    _ => 0,
                }
            })
            .collect()
    }

    /// Drops totals that fell out of the history window.
    pub fn trim(&mut self, today: NaiveDate) {
        let oldest = window_start(today);
        self.totals.retain(|day, _| *day >= oldest);
    }
}

/// Earliest report date kept for `today`.
pub fn window_start(today: NaiveDate) -> NaiveDate {
    today - Days::new(HISTORY_DAYS)
}

/// At most four glyphs, using k and M suffixes.
pub fn format_count(n: u64) -> String {
    let n_f = n as f64;
    match n.checked_ilog10().map_or(1, |log| log + 1) {
        4 => format!("{:.1}k", n_f / 1_000.0),
        5 | 6 => format!("{:.0}k", n_f / 1_000.0),
        7 => format!("{:.1}M", n_f / 1_000_000.0),
        8 | 9 => format!("{:.0}M", n_f / 1_000_000.0),
        _ => n.to_string(),
    }
}

/// Label, yesterday's total, yesterday's increase and a graph of recent
/// increases on one text line starting at `y`. Unknown values show as `?`.
pub fn draw_series_row(
    surface: &mut Surface,
    y: i32,
    series: &DailySeries,
    today: NaiveDate,
    highlight: Rgb888,
) {
    let width = surface.width() as i32;
    let yesterday = today - Days::new(1);
    let increases = series.daily_increases(today);

    write_text(surface, &series.label, WHITE, Align::Left, 1, y);

    let total_right = width / 2 - 2;
    match series.totals.get(&yesterday).filter(|total| **total > 0) {
        Some(total) => write_text(
            surface,
            &format_count(*total),
            highlight,
            Align::Right,
            total_right,
            y,
        ),
        None => write_text(surface, "?", GRAY, Align::Right, total_right, y),
    }

    let increase_right = width * 3 / 4;
    match increases.last().filter(|increase| **increase > 0) {
        Some(increase) => write_text(
            surface,
            &format!("+{}", format_count(*increase)),
            highlight,
            Align::Right,
            increase_right,
            y,
        ),
        None => write_text(surface, "+?", GRAY, Align::Right, increase_right, y),
    }

    let graph_x = width - HISTORY_DAYS as i32;
    draw_bar_graph(surface, highlight, graph_x, y + 6, GRAPH_HEIGHT, &increases);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::YELLOW;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, d).unwrap()
    }

    fn series(totals: &[(u32, u64)]) -> DailySeries {
        let mut series = DailySeries::new(&RegionConfig::new("Massachusetts", "Mass"));
        series.totals = totals.iter().map(|(d, n)| (day(*d), *n)).collect();
        series
    }

    #[test]
    fn formats_counts_in_four_glyphs() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_234), "1.2k");
        assert_eq!(format_count(45_600), "46k");
        assert_eq!(format_count(456_000), "456k");
        assert_eq!(format_count(1_260_000), "1.3M");
        assert_eq!(format_count(98_700_000), "99M");
        assert_eq!(format_count(1_500_000_000), "1500000000");
    }

    #[test]
    fn increases_bridge_missing_days() {
        // The 17th is missing, so the 18th is compared with the 16th.
        let series = series(&[(15, 100), (16, 130), (18, 190), (19, 200)]);
        let increases = series.daily_increases(day(20));
        assert_eq!(increases.len(), HISTORY_DAYS as usize - 1);
        assert_eq!(&increases[increases.len() - 4..], &[30, 0, 60, 10]);
        // Nothing before the first total.
        assert!(increases[..increases.len() - 5].iter().all(|n| *n == 0));
    }

    #[test]
    fn trim_keeps_the_window() {
        let mut series = series(&[(1, 10), (20, 20)]);
        series.trim(day(31));
        assert_eq!(series.totals.keys().copied().collect::<Vec<_>>(), [day(20)]);
        assert_eq!(window_start(day(31)), day(2));
    }

    #[test]
    fn row_marks_unknown_values() {
        let empty = series(&[]);
        let mut unknown = Surface::blank(128, 32);
        draw_series_row(&mut unknown, 8, &empty, day(20), YELLOW);

        let known = series(&[(18, 1_000), (19, 1_500)]);
        let mut drawn = Surface::blank(128, 32);
        draw_series_row(&mut drawn, 8, &known, day(20), YELLOW);

        let yellow = |surface: &Surface| {
            (0..128)
                .flat_map(|x| (8..16).map(move |y| (x, y)))
                .filter(|(x, y)| surface.pixel(*x, *y) == Some(YELLOW))
                .count()
        };
        assert_eq!(yellow(&unknown), 0);
        assert!(yellow(&drawn) > 0);
    }
}
