//! Text measuring and rasterization into 1-bit bitmaps.
//!
//! Vector fonts go through fontdue; the built-in font goes through
//! embedded-graphics' mono font renderer.

use embedded_graphics::{
    mono_font::MonoTextStyle,
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use status_oled_hw::MonoBitmap;

use super::font::Font;

/// Minimum glyph coverage for a pixel to be lit.
const COVERAGE_THRESHOLD: u8 = 128;

/// Inclusive-exclusive bounding box in buffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BBox {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }
}

/// Which point of the text the origin refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    /// Origin is the left edge and the top of the ascender; no baseline offset.
    #[default]
    LeftTop,
}

/// Text renderer over the two font kinds.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl TextRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Width and height of the rendered text, for fonts without bbox support.
    pub fn text_size(&self, text: &str, font: &Font) -> (u32, u32) {
        match font {
            Font::Builtin(mono) => {
                let chars = text.chars().count() as u32;
                let advance = mono.character_size.width + mono.character_spacing;
                let width = (chars * advance).saturating_sub(mono.character_spacing);
                (width, mono.character_size.height)
            }
            Font::Vector { .. } => {
                let bbox = self.measure(text, font, (0, 0), Anchor::LeftTop);
                (bbox.width().max(0) as u32, bbox.height().max(0) as u32)
            }
        }
    }

    /// Bounding box of `text` drawn at `origin`.
    ///
    /// For vector fonts the box spans from the origin to the advance (or ink,
    /// whichever reaches further) horizontally, and down to the lowest ink
    /// pixel vertically.
    pub fn measure(&self, text: &str, font: &Font, origin: (i32, i32), anchor: Anchor) -> BBox {
        let (ox, oy) = origin;
        match font {
            Font::Builtin(_) => {
                let (w, h) = self.text_size(text, font);
                BBox::new(ox, oy, ox + w as i32, oy + h as i32)
            }
            Font::Vector { face, size } => {
                let baseline = baseline(face, *size, oy, anchor);
                let mut pen = 0.0f32;
                let mut right = ox;
                let mut bottom = baseline;
                for ch in text.chars() {
                    let metrics = face.metrics(ch, *size);
                    if metrics.width > 0 {
                        right = right.max(ox + pen.round() as i32 + metrics.xmin + metrics.width as i32);
                        bottom = bottom.max(baseline - metrics.ymin);
                    }
                    pen += metrics.advance_width;
                }
                right = right.max(ox + pen.ceil() as i32);
                BBox::new(ox, oy, right, bottom)
            }
        }
    }

    /// Draws `text` at `origin`, setting covered pixels to `on`.
    pub fn draw(
        &self,
        target: &mut MonoBitmap,
        origin: (i32, i32),
        text: &str,
        font: &Font,
        on: bool,
        anchor: Anchor,
    ) {
        let (ox, oy) = origin;
        match font {
            Font::Builtin(mono) => {
                let color = if on { BinaryColor::On } else { BinaryColor::Off };
                let style = MonoTextStyle::new(*mono, color);
                let baseline = match anchor {
                    Anchor::LeftTop => Baseline::Top,
                };
                let mut surface = BitmapTarget(target);
                // Infallible: BitmapTarget clips instead of failing.
                let _ = Text::with_baseline(text, Point::new(ox, oy), style, baseline)
                    .draw(&mut surface);
            }
            Font::Vector { face, size } => {
                let baseline = baseline(face, *size, oy, anchor);
                let mut pen = 0.0f32;
                for ch in text.chars() {
                    let (metrics, coverage) = face.rasterize(ch, *size);
                    let left = ox + pen.round() as i32 + metrics.xmin;
                    let top = baseline - metrics.ymin - metrics.height as i32;
                    for gy in 0..metrics.height {
                        for gx in 0..metrics.width {
                            if coverage[gy * metrics.width + gx] >= COVERAGE_THRESHOLD {
                                target.set_pixel(left + gx as i32, top + gy as i32, on);
                            }
                        }
                    }
                    pen += metrics.advance_width;
                }
            }
        }
    }
}

fn ascent(face: &fontdue::Font, size: f32) -> f32 {
    face.horizontal_line_metrics(size)
        .map(|m| m.ascent)
        .unwrap_or(size)
}

/// Baseline row of a vector font line anchored at `oy`.
fn baseline(face: &fontdue::Font, size: f32, oy: i32, anchor: Anchor) -> i32 {
    match anchor {
        Anchor::LeftTop => oy + ascent(face, size).round() as i32,
    }
}

/// embedded-graphics draw target over a [`MonoBitmap`].
pub(super) struct BitmapTarget<'a>(pub(super) &'a mut MonoBitmap);

impl OriginDimensions for BitmapTarget<'_> {
    fn size(&self) -> Size {
        Size::new(self.0.width(), self.0.height())
    }
}

impl DrawTarget for BitmapTarget<'_> {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.0.set_pixel(point.x, point.y, color.is_on());
        }
        Ok(())
    }
}
