//! 1-bit framebuffer for the OLED panel.

use crate::{PANEL_HEIGHT, PANEL_WIDTH};

/// Packed 1bpp bitmap, row-major.
///
/// Bit mapping within one row byte: bit 7 is the leftmost pixel in that byte.
/// A set bit is a lit pixel on the panel.
#[derive(Clone, PartialEq, Eq)]
pub struct MonoBitmap {
    /// Packed pixel rows.
    bytes: Vec<u8>,
    /// Width of the bitmap.
    width: u32,
    /// Height of the bitmap.
    height: u32,
}

impl Default for MonoBitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MonoBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonoBitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("lit", &self.lit_count())
            .finish()
    }
}

impl MonoBitmap {
    /// Creates a new panel-sized bitmap with every pixel off.
    pub fn new() -> Self {
        Self::with_dimensions(PANEL_WIDTH, PANEL_HEIGHT)
    }

    /// Creates a bitmap with custom dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        let stride = Self::stride_for(width);
        Self {
            bytes: vec![0; stride * height as usize],
            width,
            height,
        }
    }

    fn stride_for(width: u32) -> usize {
        (width as usize).div_ceil(8)
    }

    fn stride(&self) -> usize {
        Self::stride_for(self.width)
    }

    /// Returns the width of the bitmap.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the bitmap.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the packed row bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Sets every pixel to `on`.
    pub fn clear(&mut self, on: bool) {
        self.bytes.fill(if on { 0xFF } else { 0x00 });
    }

    fn index(&self, x: i32, y: i32) -> Option<(usize, u8)> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let byte = y as usize * self.stride() + x as usize / 8;
        let mask = 0x80u8 >> (x as usize % 8);
        Some((byte, mask))
    }

    /// Sets a pixel state.
    ///
    /// Returns `true` when the pixel is in bounds, `false` otherwise.
    pub fn set_pixel(&mut self, x: i32, y: i32, on: bool) -> bool {
        match self.index(x, y) {
            Some((byte, mask)) => {
                if on {
                    self.bytes[byte] |= mask;
                } else {
                    self.bytes[byte] &= !mask;
                }
                true
            }
            None => false,
        }
    }

    /// Reads a pixel state, `None` when out of bounds.
    pub fn pixel(&self, x: i32, y: i32) -> Option<bool> {
        self.index(x, y)
            .map(|(byte, mask)| self.bytes[byte] & mask != 0)
    }

    /// Returns true if the pixel is in bounds and lit.
    pub fn is_on(&self, x: i32, y: i32) -> bool {
        self.pixel(x, y).unwrap_or(false)
    }

    /// Number of lit pixels.
    pub fn lit_count(&self) -> u32 {
        self.bytes.iter().map(|b| b.count_ones()).sum()
    }

    /// Iterates over the coordinates of every lit pixel, row by row.
    pub fn lit_pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).filter_map(move |x| self.is_on(x as i32, y as i32).then_some((x, y)))
        })
    }

}
