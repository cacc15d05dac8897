//! Drawing surface shared by every display sink.

use anyhow::{Context, Result};
use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment},
};
use image::{Rgba, RgbaImage};
use status_oled_hw::{MonoBitmap, PANEL_HEIGHT, PANEL_WIDTH};

use super::font::Font;
use super::text::{Anchor, BBox, BitmapTarget, TextRenderer};

/// Color of an unlit pixel in the translucent image.
const UNLIT: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// Color of a lit pixel in the translucent image.
const LIT: Rgba<u8> = Rgba([255, 255, 255, 0]);

/// 1-bit frame with drawing primitives.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    bitmap: MonoBitmap,
    text: TextRenderer,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Creates a blank panel-sized frame.
    pub fn new() -> Self {
        Self {
            bitmap: MonoBitmap::new(),
            text: TextRenderer::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.bitmap.width() as i32
    }

    pub fn height(&self) -> i32 {
        self.bitmap.height() as i32
    }

    /// Turns every pixel off.
    pub fn clear(&mut self) {
        self.bitmap.clear(false);
    }

    /// Fills the inclusive rectangle `rect`.
    ///
    /// Interior pixels take `fill`, the one-pixel border ring takes `outline`.
    /// Pixels outside the frame are clipped.
    pub fn fill_rect(&mut self, rect: BBox, outline: bool, fill: bool) {
        let BBox { x0, y0, x1, y1 } = rect;
        if x1 < x0 || y1 < y0 {
            return;
        }
        let style = PrimitiveStyleBuilder::new()
            .stroke_color(color(outline))
            .stroke_width(1)
            .stroke_alignment(StrokeAlignment::Inside)
            .fill_color(color(fill))
            .build();
        self.draw(Rectangle::with_corners(Point::new(x0, y0), Point::new(x1, y1)).into_styled(style));
    }

    /// Clears the rows `y0..y1` across the full width.
    pub fn clear_band(&mut self, y0: i32, y1: i32) {
        if y1 > y0 {
            let band = Rectangle::new(
                Point::new(0, y0),
                Size::new(self.bitmap.width(), (y1 - y0) as u32),
            );
            self.draw(band.into_styled(PrimitiveStyle::with_fill(BinaryColor::Off)));
        }
    }

    fn draw(&mut self, item: impl Drawable<Color = BinaryColor>) {
        // Infallible: BitmapTarget clips instead of failing.
        let _ = item.draw(&mut BitmapTarget(&mut self.bitmap));
    }

    /// Draws lit text at `origin` and returns its bounding box.
    pub fn draw_text(&mut self, origin: (i32, i32), text: &str, font: &Font, anchor: Anchor) -> BBox {
        let bbox = self.text.measure(text, font, origin, anchor);
        self.text
            .draw(&mut self.bitmap, origin, text, font, true, anchor);
        bbox
    }

    /// Returns the underlying bitmap.
    pub fn bitmap(&self) -> &MonoBitmap {
        &self.bitmap
    }

    /// Renders the frame as RGBA: unlit pixels opaque black, lit pixels fully
    /// transparent so a client-side background color shows through.
    pub fn to_translucent_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.bitmap.width(), self.bitmap.height(), |x, y| {
            if self.bitmap.is_on(x as i32, y as i32) {
                LIT
            } else {
                UNLIT
            }
        })
    }

    /// PNG encoding of [`Self::to_translucent_image`].
    pub fn to_encoded_buffer(&self) -> Result<Vec<u8>> {
        encode_png(&self.to_translucent_image())
    }
}

fn color(on: bool) -> BinaryColor {
    if on {
        BinaryColor::On
    } else {
        BinaryColor::Off
    }
}

/// PNG of an all-unlit panel-sized frame.
pub fn blank_png() -> Result<Vec<u8>> {
    encode_png(&RgbaImage::from_pixel(PANEL_WIDTH, PANEL_HEIGHT, UNLIT))
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .context("Failed to write PNG header")?;
        writer
            .write_image_data(image.as_raw())
            .context("Failed to write PNG data")?;
    }
    Ok(png_data)
}
