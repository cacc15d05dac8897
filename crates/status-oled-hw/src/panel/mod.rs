//! OLED panel device abstraction.
//!
//! Consumers render into a [`MonoBitmap`] and push it through a
//! [`PanelDevice`]. The real SSD1306 implementation lives behind the `i2c`
//! feature; availability is checked once through [`i2c_available`] so callers
//! can decide up front whether a hardware sink makes sense.

#[cfg(feature = "i2c")]
mod i2c;

#[cfg(feature = "i2c")]
pub use i2c::I2cPanel;

use crate::{MonoBitmap, Result, Rotation};
use std::path::Path;

/// A monochrome panel that accepts whole frames.
pub trait PanelDevice: Send {
    /// Sets the rotation applied to subsequently pushed frames.
    fn set_rotation(&mut self, rotation: Rotation) -> Result<()>;

    /// Loads a frame into the device buffer without displaying it.
    fn push_frame(&mut self, frame: &MonoBitmap) -> Result<()>;

    /// Commits the device buffer to the glass.
    fn show(&mut self) -> Result<()>;

    /// Sets every pixel of the device buffer to `on`.
    fn fill(&mut self, on: bool) -> Result<()>;
}

/// Lit pixels of `frame` in panel coordinates after `rotation`.
pub fn device_pixels(
    frame: &MonoBitmap,
    rotation: Rotation,
) -> impl Iterator<Item = (u32, u32)> + '_ {
    let (width, height) = (frame.width(), frame.height());
    frame
        .lit_pixels()
        .map(move |(x, y)| rotation.map_pixel(x, y, width, height))
}

/// Returns true if I2C panel support is compiled in and the bus node exists.
pub fn i2c_available(bus: &str) -> bool {
    cfg!(feature = "i2c") && Path::new(bus).exists()
}

/// Opens the I2C panel at `address` on `bus`.
#[cfg(feature = "i2c")]
pub fn open_i2c(bus: &str, address: u8) -> Result<Box<dyn PanelDevice>> {
    Ok(Box::new(I2cPanel::open(bus, address)?))
}

/// Opens the I2C panel at `address` on `bus`.
#[cfg(not(feature = "i2c"))]
pub fn open_i2c(_bus: &str, _address: u8) -> Result<Box<dyn PanelDevice>> {
    Err(crate::Error::Unsupported)
}
