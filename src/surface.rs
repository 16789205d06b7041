use std::convert::Infallible;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use image::{Rgba, RgbaImage};

const OFF: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Fixed-size frame buffer that slides paint into and display sinks consume.
///
/// Writes outside the frame are dropped rather than reported, so drawing code
/// can overhang the edges freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, OFF),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Horizontal midpoint, used as the anchor for centred text.
    pub fn midpoint(&self) -> i32 {
        (self.width() / 2) as i32
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb888> {
        let (x, y) = self.index(x, y)?;
        let Rgba([r, g, b, _]) = *self.pixels.get_pixel(x, y);
        Some(Rgb888::new(r, g, b))
    }

    /// Returns false when the coordinate falls outside the frame.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb888) -> bool {
        match self.index(x, y) {
            Some((x, y)) => {
                self.pixels
                    .put_pixel(x, y, Rgba([color.r(), color.g(), color.b(), 255]));
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = OFF;
        }
    }

    pub fn is_blank(&self) -> bool {
        self.lit_pixels() == 0
    }

    pub fn lit_pixels(&self) -> usize {
        self.pixels
            .pixels()
            .filter(|Rgba([r, g, b, _])| *r != 0 || *g != 0 || *b != 0)
            .count()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    fn index(&self, x: i32, y: i32) -> Option<(u32, u32)> {
        let x = u32::try_from(x).ok()?;
        let y = u32::try_from(y).ok()?;
        (x < self.width() && y < self.height()).then_some((x, y))
    }
}

impl OriginDimensions for Surface {
    fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }
}

impl DrawTarget for Surface {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point.x, point.y, color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_surface_has_no_lit_pixels() {
        let surface = Surface::blank(128, 32);
        assert_eq!((surface.width(), surface.height()), (128, 32));
        assert_eq!(surface.midpoint(), 64);
        assert!(surface.is_blank());
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut surface = Surface::blank(4, 4);
        assert!(!surface.set_pixel(-1, 0, Rgb888::RED));
        assert!(!surface.set_pixel(4, 0, Rgb888::RED));
        assert!(!surface.set_pixel(0, 4, Rgb888::RED));
        assert!(surface.is_blank());
        assert_eq!(surface.pixel(9, 9), None);
    }

    #[test]
    fn set_then_clear() {
        let mut surface = Surface::blank(4, 4);
        assert!(surface.set_pixel(1, 2, Rgb888::new(10, 20, 30)));
        assert_eq!(surface.pixel(1, 2), Some(Rgb888::new(10, 20, 30)));
        assert_eq!(surface.lit_pixels(), 1);
        surface.clear();
        assert!(surface.is_blank());
    }

    #[test]
    fn draw_target_clips_to_frame() {
        use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

        let mut surface = Surface::blank(8, 8);
        let _ = Rectangle::new(Point::new(6, 6), Size::new(4, 4))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::GREEN))
            .draw(&mut surface);
        assert_eq!(surface.lit_pixels(), 4);
    }
}
