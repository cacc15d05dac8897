//! Error types for the StatusOLED hardware library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when interacting with the panel hardware.
#[derive(Error, Debug)]
pub enum Error {
    /// Panel not found on the bus or did not answer the init sequence.
    #[error("OLED panel unavailable on {bus} at address 0x{address:02X}")]
    DeviceUnavailable { bus: String, address: u8 },

    /// Crate was built without I2C panel support.
    #[error("I2C panel support not compiled in")]
    Unsupported,

    /// Display interface (bus-level) error while talking to the panel.
    #[error("Display interface error: {0}")]
    Interface(String),

    /// Invalid rotation value.
    #[error("Invalid rotation: {0}")]
    InvalidRotation(String),
}
