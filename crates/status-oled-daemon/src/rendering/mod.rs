//! Rendering module for fonts, text and the 1-bit framebuffer.

mod font;
mod framebuffer;
mod text;

pub use font::{available_fonts, Font};
pub use framebuffer::{blank_png, FrameBuffer};
pub use text::{Anchor, BBox};
