//! Text and primitive drawing helpers shared by every slide.
//!
//! Coordinates follow the LED panel: `(0, 0)` is the top-left dot and text is
//! anchored by its top edge.

use anyhow::{Result, ensure};
use embedded_graphics::mono_font::ascii::{FONT_4X6, FONT_5X7};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::renderer::TextRenderer;
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};

use crate::surface::Surface;

pub const WHITE: Rgb888 = Rgb888::new(255, 255, 255);
pub const YELLOW: Rgb888 = Rgb888::new(255, 255, 0);
pub const AQUA: Rgb888 = Rgb888::new(0, 255, 255);
pub const RED: Rgb888 = Rgb888::new(255, 0, 0);
pub const GREEN: Rgb888 = Rgb888::new(0, 255, 0);
pub const GRAY: Rgb888 = Rgb888::new(128, 128, 128);
pub const DIM: Rgb888 = Rgb888::new(48, 48, 48);

/// Height of one line of regular text, including the gap below it.
pub const LINE_HEIGHT: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

impl From<Align> for Alignment {
    fn from(value: Align) -> Self {
        match value {
            Align::Left => Alignment::Left,
            Align::Center => Alignment::Center,
            Align::Right => Alignment::Right,
        }
    }
}

/// Writes `text` with the regular 5x7 font. `x` is the left edge, centre or
/// right edge depending on `align`.
pub fn write_text(surface: &mut Surface, text: &str, color: Rgb888, align: Align, x: i32, y: i32) {
    write_with_font(surface, &FONT_5X7, text, color, align, x, y);
}

/// Same as [`write_text`] with the compact 4x6 font.
pub fn write_small_text(
    surface: &mut Surface,
    text: &str,
    color: Rgb888,
    align: Align,
    x: i32,
    y: i32,
) {
    write_with_font(surface, &FONT_4X6, text, color, align, x, y);
}

/// Left-aligned text that is cut at the last whole character fitting in
/// `max_width` pixels.
pub fn write_text_boxed(
    surface: &mut Surface,
    text: &str,
    color: Rgb888,
    x: i32,
    y: i32,
    max_width: u32,
) {
    let mut end = text.len();
    while end > 0 && text_width(&text[..end]) > max_width {
        end = text[..end]
            .char_indices()
            .next_back()
            .map_or(0, |(idx, _)| idx);
    }
    write_text(surface, &text[..end], color, Align::Left, x, y);
}

/// Width in pixels of `text` in the regular font.
pub fn text_width(text: &str) -> u32 {
    MonoTextStyle::new(&FONT_5X7, WHITE)
        .measure_string(text, Point::zero(), Baseline::Top)
        .bounding_box
        .size
        .width
}

pub fn fill_box(surface: &mut Surface, color: Rgb888, x: i32, y: i32, width: u32, height: u32) {
    let Ok(()) = Rectangle::new(Point::new(x, y), Size::new(width, height))
        .into_styled(PrimitiveStyle::with_fill(color))
        .draw(surface);
}

pub fn outline_box(surface: &mut Surface, color: Rgb888, x: i32, y: i32, width: u32, height: u32) {
    let Ok(()) = Rectangle::new(Point::new(x, y), Size::new(width, height))
        .into_styled(PrimitiveStyle::with_stroke(color, 1))
        .draw(surface);
}

pub fn horizontal_line(surface: &mut Surface, color: Rgb888, x: i32, y: i32, length: u32) {
    if length == 0 {
        return;
    }
    let end = x + length as i32 - 1;
    let Ok(()) = Line::new(Point::new(x, y), Point::new(end, y))
        .into_styled(PrimitiveStyle::with_stroke(color, 1))
        .draw(surface);
}

/// One column per value, rising from `bottom`. The largest value fills
/// `height` dots; zero draws nothing.
pub fn draw_bar_graph(
    surface: &mut Surface,
    color: Rgb888,
    x: i32,
    bottom: i32,
    height: u32,
    values: &[u64],
) {
    let Some(&max) = values.iter().max().filter(|max| **max > 0) else {
        return;
    };
    for (column, value) in values.iter().enumerate() {
        let bar = ((*value as f64 / max as f64) * height as f64).round() as u32;
        if bar == 0 {
            continue;
        }
        let top = bottom - bar as i32 + 1;
        fill_box(surface, color, x + column as i32, top, 1, bar);
    }
}

/// Placeholder for data-backed slides that have never loaded anything.
pub fn draw_no_data(surface: &mut Surface, label: &str) {
    draw_message(surface, label, "NO DATA");
}

/// Title on the first line, short status message on the third.
pub fn draw_message(surface: &mut Surface, title: &str, message: &str) {
    let mid = surface.midpoint();
    write_text(surface, &title.to_uppercase(), YELLOW, Align::Center, mid, 2);
    write_text(surface, &message.to_uppercase(), RED, Align::Center, mid, 18);
}

/// Halves every channel. Route colours at full brightness swamp the panel.
pub fn reduce_color(color: Rgb888) -> Rgb888 {
    Rgb888::new(color.r() / 2, color.g() / 2, color.b() / 2)
}

/// Parses `RRGGBB`, with or without a leading `#`.
pub fn parse_hex_color(value: &str) -> Result<Rgb888> {
    let hex = value.trim().trim_start_matches('#');
    ensure!(
        hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        "color {value:?} must be six hex digits (RRGGBB)"
    );
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16);
    Ok(Rgb888::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn write_with_font(
    surface: &mut Surface,
    font: &MonoFont<'_>,
    text: &str,
    color: Rgb888,
    align: Align,
    x: i32,
    y: i32,
) {
    let character_style = MonoTextStyle::new(font, color);
    let text_style = TextStyleBuilder::new()
        .alignment(align.into())
        .baseline(Baseline::Top)
        .build();
    let Ok(_) = Text::with_text_style(text, Point::new(x, y), character_style, text_style)
        .draw(surface);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("DA291C").unwrap(), Rgb888::new(0xDA, 0x29, 0x1C));
        assert_eq!(parse_hex_color("#00843d").unwrap(), Rgb888::new(0x00, 0x84, 0x3D));
        assert!(parse_hex_color("12345").is_err());
        assert!(parse_hex_color("GG0000").is_err());
    }

    #[test]
    fn text_lands_inside_the_frame() {
        let mut surface = Surface::blank(128, 32);
        write_text(&mut surface, "HELLO!", YELLOW, Align::Center, 64, 2);
        assert!(surface.lit_pixels() > 0);
        assert!(surface.pixel(0, 0).is_some_and(|p| p == Rgb888::BLACK));
    }

    #[test]
    fn bar_graph_scales_to_largest_value() {
        let mut surface = Surface::blank(8, 8);
        draw_bar_graph(&mut surface, GREEN, 1, 7, 4, &[0, 2, 4]);
        let lit_in_column = |x| (0..8).filter(|y| surface.pixel(x, *y) == Some(GREEN)).count();
        assert_eq!(lit_in_column(1), 0);
        assert_eq!(lit_in_column(2), 2);
        assert_eq!(lit_in_column(3), 4);
        assert_eq!(surface.pixel(3, 4), Some(GREEN));
        assert_eq!(surface.pixel(3, 3), Some(Rgb888::BLACK));
    }

    #[test]
    fn right_aligned_text_ends_at_anchor() {
        let mut surface = Surface::blank(128, 32);
        write_text(&mut surface, "I", WHITE, Align::Right, 40, 0);
        for y in 0..8 {
            for x in 41..128 {
                assert_eq!(surface.pixel(x, y), Some(Rgb888::BLACK));
            }
        }
    }

    #[test]
    fn boxed_text_is_truncated() {
        let mut wide = Surface::blank(128, 32);
        write_text(&mut wide, "FOREST HILLS", WHITE, Align::Left, 0, 0);
        let mut boxed = Surface::blank(128, 32);
        write_text_boxed(&mut boxed, "FOREST HILLS", WHITE, 0, 0, 20);
        assert!(boxed.lit_pixels() < wide.lit_pixels());
        for y in 0..8 {
            for x in 21..128 {
                assert_eq!(boxed.pixel(x, y), Some(Rgb888::BLACK));
            }
        }
    }

    #[test]
    fn no_data_placeholder_is_not_blank() {
        let mut surface = Surface::blank(128, 32);
        draw_no_data(&mut surface, "Weather");
        assert!(!surface.is_blank());
    }

    #[test]
    fn outline_leaves_interior_dark() {
        let mut surface = Surface::blank(16, 16);
        outline_box(&mut surface, AQUA, 2, 2, 6, 6);
        assert_eq!(surface.pixel(2, 2), Some(AQUA));
        assert_eq!(surface.pixel(4, 4), Some(Rgb888::BLACK));
        horizontal_line(&mut surface, RED, 0, 12, 5);
        assert_eq!(surface.pixel(4, 12), Some(RED));
        assert_eq!(surface.pixel(5, 12), Some(Rgb888::BLACK));
    }
}
