//! StatusOLED Hardware Library
//!
//! Provides the 1-bit framebuffer type and hardware abstraction for the
//! 128x64 SSD1306-class OLED panels driven over Linux I2C.

pub mod bitmap;
pub mod error;
pub mod panel;
pub mod rotation;

pub use bitmap::MonoBitmap;
pub use error::{Error, Result};
pub use panel::PanelDevice;
pub use rotation::Rotation;

/// Panel display dimensions
pub const PANEL_WIDTH: u32 = 128;
pub const PANEL_HEIGHT: u32 = 64;

/// Default I2C bus device and 7-bit panel address
pub const DEFAULT_I2C_BUS: &str = "/dev/i2c-1";
pub const DEFAULT_I2C_ADDRESS: u8 = 0x3C;
