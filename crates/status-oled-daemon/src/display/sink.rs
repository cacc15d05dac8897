//! Display sink trait.

use anyhow::Result;

use crate::config::Settings;

/// A consumer of the composed image.
///
/// Sinks read copies of the frame and never draw into it.
pub trait DisplaySink: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns true if `update` pushes frames.
    fn is_enabled(&self) -> bool;

    /// Blanks the output.
    fn clear(&mut self) -> Result<()>;

    /// Pushes the current frame.
    fn update(&mut self) -> Result<()>;

    /// Applies changed runtime settings.
    fn apply_settings(&mut self, settings: &Settings) -> Result<()>;
}
