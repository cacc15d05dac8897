//! SSD1306 panel over Linux i2c-dev.

use display_interface_i2c::I2CInterface;
use linux_embedded_hal::I2cdev;
use ssd1306::{mode::BufferedGraphicsMode, prelude::*, I2CDisplayInterface, Ssd1306};
use tracing::{debug, info};

use super::{device_pixels, PanelDevice};
use crate::{Error, MonoBitmap, Result, Rotation, PANEL_HEIGHT, PANEL_WIDTH};

/// Concrete display type used by [`I2cPanel`].
type Display = Ssd1306<
    I2CInterface<I2cdev>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

/// SSD1306 128x64 panel controller.
///
/// The controller is always initialised with `Rotate0`; rotation is applied
/// in software when a frame is pushed.
pub struct I2cPanel {
    display: Display,
    rotation: Rotation,
}

impl I2cPanel {
    /// Opens the bus and sends the SSD1306 initialisation sequence.
    pub fn open(bus: &str, address: u8) -> Result<Self> {
        let unavailable = || Error::DeviceUnavailable {
            bus: bus.to_string(),
            address,
        };

        let i2c = I2cdev::new(bus).map_err(|e| {
            debug!("Failed to open I2C bus {}: {:?}", bus, e);
            unavailable()
        })?;

        let interface = I2CDisplayInterface::new_custom_address(i2c, address);
        let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();

        display.init().map_err(|e| {
            debug!("Panel did not answer init sequence: {:?}", e);
            unavailable()
        })?;

        info!("OLED panel opened on {} (address 0x{:02X})", bus, address);

        Ok(Self {
            display,
            rotation: Rotation::default(),
        })
    }
}

impl PanelDevice for I2cPanel {
    fn set_rotation(&mut self, rotation: Rotation) -> Result<()> {
        self.rotation = rotation;
        debug!("Panel rotation set to {}", rotation);
        Ok(())
    }

    fn push_frame(&mut self, frame: &MonoBitmap) -> Result<()> {
        self.display.clear_buffer();
        for (x, y) in device_pixels(frame, self.rotation) {
            self.display.set_pixel(x, y, true);
        }
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        self.display
            .flush()
            .map_err(|e| Error::Interface(format!("{:?}", e)))
    }

    fn fill(&mut self, on: bool) -> Result<()> {
        self.display.clear_buffer();
        if on {
            for y in 0..PANEL_HEIGHT {
                for x in 0..PANEL_WIDTH {
                    self.display.set_pixel(x, y, true);
                }
            }
        }
        Ok(())
    }
}
