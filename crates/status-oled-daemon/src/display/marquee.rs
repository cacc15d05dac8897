//! Horizontal scrolling of a line that does not fit the panel.

use std::time::Duration;

/// Interval between two animation ticks (20 fps).
pub const ANIMATION_DELAY: Duration = Duration::from_millis(50);

/// Slowest scroll speed in pixels per tick.
pub const ANIMATION_SPEED_XSLOW: u32 = 1;

/// Fastest scroll speed in pixels per tick.
pub const ANIMATION_SPEED_XFAST: u32 = 18;

/// Outcome of one animation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The line moved and more ticks follow.
    Scrolling,
    /// The last loop finished; the line is parked at `x = 0`.
    Finished,
}

/// Scroll geometry of the animated line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marquee {
    /// Current left edge of the line.
    pub x: i32,
    /// Top of the animated band.
    pub y: i32,
    /// Rendered width of the line.
    pub width: i32,
    /// Height of the animated band.
    pub height: i32,
    /// Full passes left before the line parks.
    pub loops_remaining: u32,
    /// Pixels moved per tick.
    pub speed: u32,
    /// Width of the visible area; the line re-enters from here.
    pub viewport: i32,
}

impl Marquee {
    pub fn new(x: i32, y: i32, width: i32, height: i32, loops: u32, speed: u32, viewport: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            loops_remaining: loops,
            speed: clamp_speed(speed),
            viewport,
        }
    }

    /// Advances the line by one tick.
    pub fn step(&mut self) -> Step {
        self.x -= self.speed as i32;
        if self.x < -self.width {
            self.loops_remaining = self.loops_remaining.saturating_sub(1);
            self.x = self.viewport;
            tracing::debug!("Animation loops remaining: {}", self.loops_remaining);
        }
        if self.loops_remaining == 0 && self.x <= 0 {
            self.x = 0;
            return Step::Finished;
        }
        Step::Scrolling
    }

    /// Rows covered by the band, as a half-open range.
    pub fn band(&self) -> (i32, i32) {
        (self.y, self.y + self.height + 1)
    }
}

/// Clamps a configured speed to the supported range.
pub fn clamp_speed(speed: u32) -> u32 {
    speed.clamp(ANIMATION_SPEED_XSLOW, ANIMATION_SPEED_XFAST)
}
