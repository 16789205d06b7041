//! Sinks that receive finished frames.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use tracing::{debug, info, warn};

use crate::surface::Surface;

/// Floor applied to every channel so unlit dots stay visible in renders.
pub const MIN_BRIGHTNESS: u8 = 40;
/// Fraction of a cell covered by its dot.
const DOT_FILL: f32 = 0.75;

/// Receives a finished frame. `redraw` is best-effort: a failing sink logs and
/// returns, it never reports back to the scheduler.
pub trait Display: Send + Sync {
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn redraw(&self, surface: &Surface);
}

/// Discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn redraw(&self, _surface: &Surface) {}
}

/// Simulated LED panel: each redraw replaces a PNG file on disk.
#[derive(Debug)]
pub struct PngDisplay {
    path: PathBuf,
    scale: u32,
    failing: AtomicBool,
}

impl PngDisplay {
    pub fn new(path: impl Into<PathBuf>, scale: u32) -> Self {
        Self {
            path: path.into(),
            scale: scale.max(1),
            failing: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Display for PngDisplay {
    fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        info!(path = %self.path.display(), scale = self.scale, "png display ready");
        Ok(())
    }

    fn redraw(&self, surface: &Surface) {
        match save_png(surface, &self.path, self.scale) {
            Ok(()) => {
                if self.failing.swap(false, Ordering::Relaxed) {
                    info!(path = %self.path.display(), "png display recovered");
                }
            }
            Err(err) => {
                if !self.failing.swap(true, Ordering::Relaxed) {
                    warn!(path = %self.path.display(), "png display redraw failed: {err:#}");
                }
            }
        }
    }
}

/// Renders `surface` as round dots on a black panel and writes it to `path`.
/// The file is replaced atomically.
pub fn save_png(surface: &Surface, path: &Path, scale: u32) -> Result<()> {
    let image = render_dots(surface, scale);
    let tmp = path.with_extension("png.tmp");
    image
        .save_with_format(&tmp, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move render into {}", path.display()))?;
    debug!(path = %path.display(), "saved frame");
    Ok(())
}

pub fn render_dots(surface: &Surface, scale: u32) -> RgbaImage {
    let scale = scale.max(1);
    let mut out = RgbaImage::from_pixel(
        surface.width() * scale,
        surface.height() * scale,
        Rgba([0, 0, 0, 255]),
    );
    let radius = scale as f32 * DOT_FILL / 2.0;
    let centre = scale as f32 / 2.0;
    for (x, y, pixel) in surface.as_image().enumerate_pixels() {
        let Rgba([r, g, b, _]) = *pixel;
        let color = Rgba([
            r.max(MIN_BRIGHTNESS),
            g.max(MIN_BRIGHTNESS),
            b.max(MIN_BRIGHTNESS),
            255,
        ]);
        for dy in 0..scale {
            for dx in 0..scale {
                let fx = dx as f32 + 0.5 - centre;
                let fy = dy as f32 + 0.5 - centre;
                if scale == 1 || fx * fx + fy * fy <= radius * radius {
                    out.put_pixel(x * scale + dx, y * scale + dy, color);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::Rgb888;

    #[test]
    fn dots_have_brightness_floor_and_gap() {
        let mut surface = Surface::blank(2, 1);
        surface.set_pixel(0, 0, Rgb888::new(255, 0, 0));
        let image = render_dots(&surface, 8);
        assert_eq!(image.dimensions(), (16, 8));
        assert_eq!(*image.get_pixel(4, 4), Rgba([255, 40, 40, 255]));
        assert_eq!(*image.get_pixel(12, 4), Rgba([40, 40, 40, 255]));
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn png_display_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let display = PngDisplay::new(tmp.path().join("out/frame.png"), 2);
        display.initialize().unwrap();
        display.redraw(&Surface::blank(4, 4));
        let written = image::open(display.path()).unwrap();
        assert_eq!((written.width(), written.height()), (8, 8));
    }

    #[test]
    fn png_display_failure_is_swallowed() {
        let tmp = tempfile::tempdir().unwrap();
        let display = PngDisplay::new(tmp.path().join("missing/frame.png"), 2);
        display.redraw(&Surface::blank(4, 4));
        display.redraw(&Surface::blank(4, 4));
        assert!(!display.path().exists());
    }
}
