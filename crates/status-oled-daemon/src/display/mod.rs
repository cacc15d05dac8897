//! Status image composition and the sinks that mirror it.

mod image;
mod marquee;
mod panel;
mod preview;
mod sink;

pub use self::image::{DisplayImage, FrameSignal};
pub use marquee::{ANIMATION_SPEED_XFAST, ANIMATION_SPEED_XSLOW};
pub use panel::{HardwarePanelSink, PanelOpener};
pub use preview::{PreviewSink, PushFn};
pub use sink::DisplaySink;
