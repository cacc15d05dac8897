//! Sink for the physical OLED panel.

use anyhow::{Context, Result};
use status_oled_hw::{PanelDevice, Rotation};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::image::DisplayImage;
use super::sink::DisplaySink;
use crate::config::{HardwareDisplayConfig, Settings};

/// Opens the panel device on first use.
pub type PanelOpener = Box<dyn FnMut() -> status_oled_hw::Result<Box<dyn PanelDevice>> + Send>;

/// Mirrors the image onto an I2C OLED panel.
pub struct HardwarePanelSink {
    image: Arc<DisplayImage>,
    /// Bus availability; cleared for good when opening the device fails.
    available: bool,
    enabled: bool,
    rotation: Rotation,
    opener: PanelOpener,
    device: Option<Box<dyn PanelDevice>>,
}

impl HardwarePanelSink {
    pub fn new(
        image: Arc<DisplayImage>,
        available: bool,
        config: &HardwareDisplayConfig,
        opener: PanelOpener,
    ) -> Self {
        let mut sink = Self {
            image,
            available,
            enabled: config.enabled,
            rotation: Rotation::from_flag(config.rotated_180),
            opener,
            device: None,
        };
        if !available {
            info!("No I2C bus available, hardware display disabled");
        }
        sink.init_display();
        if let Err(e) = sink.clear() {
            warn!("Failed to clear OLED panel: {}", e);
        }
        sink
    }

    /// Opens the device if needed, pushes the rotation and the current frame.
    fn init_display(&mut self) {
        if !self.is_enabled() {
            if let Err(e) = self.clear() {
                warn!("Failed to clear OLED panel: {}", e);
            }
            return;
        }

        if self.device.is_none() {
            match (self.opener)() {
                Ok(device) => self.device = Some(device),
                Err(e) => {
                    warn!("OLED panel unavailable: {}. Hardware display disabled.", e);
                    self.available = false;
                    return;
                }
            }
        }

        if let Some(device) = self.device.as_mut() {
            if let Err(e) = device.set_rotation(self.rotation) {
                warn!("Failed to set panel rotation: {}", e);
            }
        }
        if let Err(e) = self.update() {
            warn!("Failed to update OLED panel: {}", e);
        }
    }
}

impl DisplaySink for HardwarePanelSink {
    fn name(&self) -> &'static str {
        "hardware"
    }

    fn is_enabled(&self) -> bool {
        self.available && self.enabled
    }

    fn clear(&mut self) -> Result<()> {
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        device.fill(false).context("Failed to blank panel")?;
        device.show().context("Failed to commit blank frame")?;
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        device
            .push_frame(&self.image.mono_bitmap())
            .context("Failed to push frame")?;
        device.show().context("Failed to commit frame")?;
        Ok(())
    }

    fn apply_settings(&mut self, settings: &Settings) -> Result<()> {
        let config = &settings.hardware_display;
        self.enabled = config.enabled;
        self.rotation = Rotation::from_flag(config.rotated_180);
        info!(
            "Hardware display set to enabled {} rotated {}°",
            self.enabled,
            self.rotation.degrees()
        );
        debug!("Reinitializing OLED panel");
        self.init_display();
        Ok(())
    }
}
