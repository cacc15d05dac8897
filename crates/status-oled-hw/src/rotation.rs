//! Panel rotation support.
//!
//! The panel is always initialised unrotated; the upside-down mounting is
//! achieved through software rotation of each pushed frame.

use crate::{Error, Result};
use std::str::FromStr;

/// Panel rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// Native orientation (0°).
    #[default]
    Normal,
    /// Mounted upside down (180°), software rotated.
    UpsideDown,
}

impl Rotation {
    /// Maps the `rotated_180` settings flag to a rotation.
    pub fn from_flag(rotated_180: bool) -> Self {
        if rotated_180 {
            Rotation::UpsideDown
        } else {
            Rotation::Normal
        }
    }

    /// Returns the rotation in degrees.
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Normal => 0,
            Rotation::UpsideDown => 180,
        }
    }

    /// Maps a frame pixel onto the panel of the given size.
    ///
    /// `(x, y)` must lie inside `width` x `height`.
    pub fn map_pixel(&self, x: u32, y: u32, width: u32, height: u32) -> (u32, u32) {
        match self {
            Rotation::Normal => (x, y),
            Rotation::UpsideDown => (width - 1 - x, height - 1 - y),
        }
    }
}

impl FromStr for Rotation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "0" | "normal" => Ok(Rotation::Normal),
            "180" | "upside-down" | "upside_down" => Ok(Rotation::UpsideDown),
            _ => Err(Error::InvalidRotation(s.to_string())),
        }
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rotation::Normal => write!(f, "normal"),
            Rotation::UpsideDown => write!(f, "upside-down"),
        }
    }
}
