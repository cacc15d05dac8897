//! The composed status image.
//!
//! A [`DisplayImage`] owns the frame buffer together with the text queue,
//! the progress value and the marquee animation. Every mutation happens under
//! one mutex; the marquee worker thread takes the same lock for each tick and
//! calls the frame signal after releasing it.

use anyhow::Result;
use status_oled_hw::MonoBitmap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use super::marquee::{Marquee, Step, ANIMATION_DELAY};
use crate::config::{AnimationConfig, DisplayConfig, ProgressBarConfig};
use crate::printer::PrinterState;
use crate::rendering::{Anchor, BBox, Font, FrameBuffer};

/// Callback invoked after every animation frame.
pub type FrameSignal = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Smallest drawn progress bar height in pixels.
const PROGRESS_BAR_MIN: i32 = 4;

/// State guarded by the image lock.
struct Composer {
    fb: FrameBuffer,
    font: Font,
    secondary_font: Font,
    animation: AnimationConfig,
    progress_bar: ProgressBarConfig,
    /// Most recent line first.
    texts: Vec<String>,
    progress: f32,
    marquee: Option<Marquee>,
    running: bool,
    worker_alive: bool,
    /// Set when the marquee was stopped from outside; frames still in
    /// flight from the worker are stale.
    cancelled: bool,
    signal: Option<FrameSignal>,
}

impl Composer {
    fn stop_animation(&mut self) {
        self.running = false;
        self.marquee = None;
    }

    /// Stops the marquee and redraws its line at rest.
    fn park(&mut self) {
        if let Some(marquee) = self.marquee.take() {
            let (band_top, band_bottom) = marquee.band();
            self.fb.clear_band(band_top, band_bottom);
            if let Some(line) = self.texts.first() {
                self.fb
                    .draw_text((0, marquee.y), line, &self.font, Anchor::LeftTop);
            }
        }
        self.running = false;
    }

    /// Redraws the text queue. Returns true if a marquee worker must be spawned.
    fn render_text(&mut self, signal: Option<FrameSignal>) -> bool {
        if signal.is_some() {
            self.signal = signal;
        }

        self.fb.clear();
        let height = self.fb.height();
        let width = self.fb.width();

        let mut oy = 0;
        let mut spawn = false;
        for (index, line) in self.texts.iter().enumerate() {
            if oy >= height - 2 {
                break;
            }
            let font = if index == 0 {
                &self.font
            } else {
                &self.secondary_font
            };
            let bbox = self.fb.draw_text((0, oy), line, font, Anchor::LeftTop);

            if index == 0 && self.signal.is_some() {
                if bbox.x1 > width {
                    if self.animation.loops > 0 {
                        debug!("Text '{}' is {}px wide, animating", line, bbox.x1);
                        self.marquee = Some(Marquee::new(
                            bbox.x0,
                            bbox.y0,
                            bbox.width(),
                            bbox.height(),
                            self.animation.loops,
                            self.animation.speed,
                            width,
                        ));
                        self.running = true;
                        self.cancelled = false;
                        spawn = !self.worker_alive;
                    } else {
                        warn!(
                            "Text '{}' is {}px wide and will be truncated (animation disabled)",
                            line, bbox.x1
                        );
                        self.running = false;
                        self.marquee = None;
                    }
                } else {
                    self.running = false;
                    self.marquee = None;
                }
            }
            oy = bbox.y1 + 1;
        }

        if spawn {
            self.worker_alive = true;
        }
        spawn
    }

    fn render_progress(&mut self) {
        if !self.progress_bar.enabled {
            return;
        }

        let h = self.fb.height();
        let w = self.fb.width();
        let ph = (self.progress_bar.size.min(i32::MAX as u32) as i32).clamp(PROGRESS_BAR_MIN, h);
        let inner = (1.0 + (w - 3) as f32 * self.progress / 100.0).round() as i32;
        // A set outline flag separates the fill with an unlit ring.
        let ring = !self.progress_bar.outline;

        self.fb
            .fill_rect(BBox::new(-1, h - 2 - ph, w + 1, h + 1), false, true);
        self.fb
            .fill_rect(BBox::new(0, h - 1 - ph, w - 1, h - 1), true, false);
        self.fb
            .fill_rect(BBox::new(1, h - ph, inner, h - 2), ring, true);
    }

    /// Advances the marquee one tick and redraws its band.
    fn tick(&mut self) -> Option<Step> {
        let marquee = self.marquee.as_mut()?;
        let step = marquee.step();
        let (x, y) = (marquee.x, marquee.y);
        let (band_top, band_bottom) = marquee.band();

        self.fb.clear_band(band_top, band_bottom);
        if let Some(line) = self.texts.first() {
            self.fb.draw_text((x, y), line, &self.font, Anchor::LeftTop);
        }
        Some(step)
    }
}

/// Text, progress and animation composed onto one frame buffer.
pub struct DisplayImage {
    shared: Arc<Mutex<Composer>>,
    printer: Option<Arc<dyn PrinterState>>,
    font_dir: PathBuf,
    tick: Duration,
}

impl DisplayImage {
    /// Creates an image configured with `config`.
    pub fn new(
        font_dir: &Path,
        config: &DisplayConfig,
        printer: Option<Arc<dyn PrinterState>>,
    ) -> Self {
        let composer = Composer {
            fb: FrameBuffer::new(),
            font: Font::builtin(),
            secondary_font: Font::builtin(),
            animation: config.animation,
            progress_bar: config.progress_bar,
            texts: Vec::new(),
            progress: 0.0,
            marquee: None,
            running: false,
            worker_alive: false,
            cancelled: false,
            signal: None,
        };
        let image = Self {
            shared: Arc::new(Mutex::new(composer)),
            printer,
            font_dir: font_dir.to_path_buf(),
            tick: ANIMATION_DELAY,
        };
        image.configure(config);
        image
    }

    fn lock(&self) -> MutexGuard<'_, Composer> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies new fonts, animation and progress bar settings and re-renders
    /// the current text and progress.
    pub fn configure(&self, config: &DisplayConfig) {
        let font = Font::load(&self.font_dir, &config.font);
        let secondary_font = Font::load(&self.font_dir, &config.secondary_font);

        let spawn = {
            let mut c = self.lock();
            c.font = font;
            c.secondary_font = secondary_font;
            c.animation = config.animation;
            c.progress_bar = config.progress_bar;

            let spawn = if c.texts.is_empty() {
                false
            } else {
                c.render_text(None)
            };
            if c.progress > 0.0 {
                c.render_progress();
            }
            spawn
        };
        if spawn {
            self.spawn_worker();
        }
    }

    /// Prepends the lines of `text` (if any) and redraws the text queue.
    ///
    /// Overflowing first lines start the marquee when a frame signal is
    /// available, either `on_frame` or the one registered by an earlier call.
    pub fn show_text(&self, text: Option<&str>, on_frame: Option<FrameSignal>) {
        let spawn = {
            let mut c = self.lock();
            if let Some(text) = text {
                let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
                lines.append(&mut c.texts);
                c.texts = lines;
            }
            c.render_text(on_frame)
        };
        if spawn {
            self.spawn_worker();
        }
    }

    /// Stores and draws the progress bar.
    ///
    /// Without a value the stored progress is redrawn, unless the printer
    /// reports it is idle.
    pub fn show_progress(&self, value: Option<f32>) {
        let value = match value {
            Some(value) => value,
            None => {
                if self.printer.as_ref().is_some_and(|p| p.is_ready()) {
                    return;
                }
                self.lock().progress
            }
        };
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 100.0)
        };

        let mut c = self.lock();
        c.progress = value;
        c.render_progress();
    }

    /// Stops the marquee and parks its line; the worker exits on its next
    /// tick and any frame it already produced counts as cancelled.
    pub fn stop_animation(&self) {
        let mut c = self.lock();
        c.park();
        c.cancelled = true;
    }

    /// Drops every queued line and stops the marquee.
    pub fn reset(&self) {
        let mut c = self.lock();
        c.texts.clear();
        c.stop_animation();
        c.cancelled = true;
        c.fb.clear();
    }

    /// True once the marquee was stopped from outside, until the next one
    /// starts.
    pub fn animation_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub fn progress(&self) -> f32 {
        self.lock().progress
    }

    /// Queued lines, most recent first.
    pub fn lines(&self) -> Vec<String> {
        self.lock().texts.clone()
    }

    #[cfg(test)]
    pub fn is_animating(&self) -> bool {
        self.lock().running
    }

    /// Copy of the current 1-bit frame.
    pub fn mono_bitmap(&self) -> MonoBitmap {
        self.lock().fb.bitmap().clone()
    }

    /// PNG of the translucent frame.
    pub fn encoded_buffer(&self) -> Result<Vec<u8>> {
        let fb = self.lock().fb.clone();
        fb.to_encoded_buffer()
    }

    #[cfg(test)]
    pub fn translucent_image(&self) -> image::RgbaImage {
        self.lock().fb.to_translucent_image()
    }

    fn spawn_worker(&self) {
        let shared = Arc::clone(&self.shared);
        let tick = self.tick;
        let spawned = std::thread::Builder::new()
            .name("marquee".to_string())
            .spawn(move || animation_worker(shared, tick));

        match spawned {
            Ok(handle) => debug!("Started animation thread {:?}", handle.thread().id()),
            Err(e) => {
                warn!("Failed to start animation thread: {}", e);
                let mut c = self.lock();
                c.worker_alive = false;
                c.stop_animation();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn set_tick_interval(&mut self, tick: Duration) {
        self.tick = tick;
    }
}

fn animation_worker(shared: Arc<Mutex<Composer>>, tick: Duration) {
    let lock = || shared.lock().unwrap_or_else(PoisonError::into_inner);

    loop {
        std::thread::sleep(tick);

        let (step, signal) = {
            let mut c = lock();
            if !c.running {
                c.worker_alive = false;
                break;
            }
            let Some(step) = c.tick() else {
                c.running = false;
                c.worker_alive = false;
                break;
            };
            if step == Step::Finished {
                debug!("Animation finished");
                c.running = false;
                c.marquee = None;
                c.worker_alive = false;
            }
            (step, c.signal.clone())
        };

        if let Some(signal) = signal {
            let failure = match catch_unwind(AssertUnwindSafe(|| signal())) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some("frame signal panicked".to_string()),
            };
            if let Some(reason) = failure {
                warn!("Stopping animation: {}", reason);
                if step != Step::Finished {
                    let mut c = lock();
                    c.stop_animation();
                    c.worker_alive = false;
                }
                break;
            }
        }

        if step == Step::Finished {
            break;
        }
    }

    debug!("Exiting animation thread");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    const LONG_LINE: &str = "A VERY LONG STATUS LINE THAT OVERFLOWS";

    fn builtin_config() -> DisplayConfig {
        DisplayConfig {
            font: crate::config::FontConfig::builtin(),
            secondary_font: crate::config::FontConfig::builtin(),
            ..DisplayConfig::default()
        }
    }

    fn image_with(config: &DisplayConfig) -> DisplayImage {
        DisplayImage::new(Path::new("/nonexistent"), config, None)
    }

    fn counting_signal() -> (FrameSignal, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let signal: FrameSignal = Arc::new(move || -> Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (signal, count)
    }

    fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn wait_until_idle(image: &DisplayImage, timeout: Duration) -> bool {
        wait_for(timeout, || !image.is_animating())
    }

    #[test]
    fn test_progress_is_clamped() {
        let image = image_with(&builtin_config());
        image.show_progress(Some(150.0));
        assert_eq!(image.progress(), 100.0);
        image.show_progress(Some(-10.0));
        assert_eq!(image.progress(), 0.0);
        image.show_progress(Some(f32::NAN));
        assert_eq!(image.progress(), 0.0);
    }

    #[test]
    fn test_progress_bar_height_is_clamped() {
        for (size, expected) in [(1u32, 4), (4, 4), (10, 10), (63, 63), (500, 64)] {
            let mut config = builtin_config();
            config.progress_bar.size = size;
            let image = image_with(&config);
            image.show_progress(Some(0.0));

            // Column 64: frame top at H-1-ph, unlit interior, frame bottom at H-1.
            let bitmap = image.mono_bitmap();
            assert!(bitmap.is_on(64, 63), "size {}", size);
            for y in (64 - expected)..63 {
                assert!(!bitmap.is_on(64, y), "size {} row {}", size, y);
            }
            if expected < 64 {
                assert!(bitmap.is_on(64, 63 - expected), "size {}", size);
            }
        }
    }

    #[test]
    fn test_progress_stored_when_bar_disabled() {
        let mut config = builtin_config();
        config.progress_bar.enabled = false;
        let image = image_with(&config);
        image.show_progress(Some(42.0));
        assert_eq!(image.progress(), 42.0);
        assert_eq!(image.mono_bitmap().lit_count(), 0);
    }

    #[test]
    fn test_inner_bar_width_follows_progress() {
        let image = image_with(&builtin_config());
        image.show_progress(Some(100.0));
        let bitmap = image.mono_bitmap();
        // Inner bar spans x 1..=126 on rows H-ph..=H-2.
        assert!(bitmap.is_on(1, 61));
        assert!(bitmap.is_on(126, 61));

        image.show_progress(Some(50.0));
        let bitmap = image.mono_bitmap();
        assert!(bitmap.is_on(64, 61));
        assert!(!bitmap.is_on(65, 61));
    }

    #[test]
    fn test_outline_flag_unlights_bar_ring() {
        let mut config = builtin_config();
        config.progress_bar.outline = true;
        config.progress_bar.size = 10;
        let image = image_with(&config);
        image.show_progress(Some(100.0));
        let bitmap = image.mono_bitmap();
        // Ring of the inner bar is off, its interior is lit.
        assert!(!bitmap.is_on(1, 54));
        assert!(bitmap.is_on(2, 55));

        config.progress_bar.outline = false;
        image.configure(&config);
        let bitmap = image.mono_bitmap();
        assert!(bitmap.is_on(1, 54));
    }

    #[test]
    fn test_idle_printer_skips_stored_progress() {
        let tracker = Arc::new(crate::printer::JobTracker::new());
        let printer: Arc<dyn PrinterState> = tracker.clone();
        let image = DisplayImage::new(Path::new("/nonexistent"), &builtin_config(), Some(printer));
        image.show_progress(Some(50.0));
        image.show_text(Some("HELLO"), None);
        image.show_progress(None);
        let without_bar = image.mono_bitmap();

        tracker.observe(crate::printer::PrinterEvent::PrintStarted);
        image.show_progress(None);
        assert_ne!(image.mono_bitmap(), without_bar);
    }

    #[test]
    fn test_lines_are_prepended() {
        let image = image_with(&builtin_config());
        image.show_text(Some("first"), None);
        image.show_text(Some("second\nthird"), None);
        assert_eq!(image.lines(), vec!["second", "third", "first"]);
        image.reset();
        assert!(image.lines().is_empty());
    }

    #[test]
    fn test_configure_twice_is_deterministic() {
        let image = image_with(&builtin_config());
        image.show_text(Some("line one\nline two"), None);
        image.show_progress(Some(30.0));

        image.configure(&builtin_config());
        let first = image.mono_bitmap();
        image.configure(&builtin_config());
        assert_eq!(image.mono_bitmap(), first);
        assert!(first.lit_count() > 0);
    }

    #[test]
    fn test_fitting_text_does_not_animate() {
        let image = image_with(&builtin_config());
        let (signal, count) = counting_signal();
        image.show_text(Some("HELLO"), Some(signal));
        assert!(!image.is_animating());
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_overflow_without_loops_is_truncated() {
        let mut config = builtin_config();
        config.animation.loops = 0;
        let image = image_with(&config);
        let (signal, _) = counting_signal();
        image.show_text(Some(LONG_LINE), Some(signal));
        assert!(!image.is_animating());
        assert!(image.mono_bitmap().lit_count() > 0);
    }

    #[test]
    fn test_marquee_runs_and_parks() {
        let mut config = builtin_config();
        config.animation.loops = 1;
        config.animation.speed = 18;
        let mut image = image_with(&config);
        image.set_tick_interval(Duration::from_millis(1));

        let (signal, count) = counting_signal();
        image.show_text(Some(LONG_LINE), Some(signal));

        // 228px line: 13 ticks to scroll out, 8 to come back from x = 128.
        assert!(wait_for(Duration::from_secs(5), || count.load(Ordering::SeqCst) >= 21));
        assert!(wait_until_idle(&image, Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), 21);

        let mut parked = FrameBuffer::new();
        parked.draw_text((0, 0), LONG_LINE, &Font::builtin(), Anchor::LeftTop);
        assert_eq!(&image.mono_bitmap(), parked.bitmap());
    }

    #[test]
    fn test_restarting_marquee_keeps_one_worker() {
        let mut config = builtin_config();
        config.animation.loops = 1;
        config.animation.speed = 18;
        let mut image = image_with(&config);
        image.set_tick_interval(Duration::from_millis(20));

        let threads = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&threads);
        let signal: FrameSignal = Arc::new(move || -> Result<()> {
            seen.lock().unwrap().push(std::thread::current().id());
            Ok(())
        });

        // The second call lands before the first tick and restarts the
        // scroll in place.
        image.show_text(Some(LONG_LINE), Some(Arc::clone(&signal)));
        image.show_text(Some(LONG_LINE), Some(signal));

        assert!(wait_for(Duration::from_secs(5), || threads.lock().unwrap().len() >= 21));
        assert!(wait_until_idle(&image, Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(60));

        let threads = threads.lock().unwrap();
        assert_eq!(threads.len(), 21);
        assert!(threads.iter().all(|id| *id == threads[0]));
    }

    #[test]
    fn test_stop_parks_scrolled_line() {
        let mut image = image_with(&builtin_config());
        image.set_tick_interval(Duration::from_millis(1));
        let (signal, count) = counting_signal();
        image.show_text(Some(LONG_LINE), Some(signal));
        assert!(wait_for(Duration::from_secs(5), || count.load(Ordering::SeqCst) >= 3));

        image.stop_animation();
        assert!(!image.is_animating());
        assert!(image.animation_cancelled());

        let mut parked = FrameBuffer::new();
        parked.draw_text((0, 0), LONG_LINE, &Font::builtin(), Anchor::LeftTop);
        assert_eq!(&image.mono_bitmap(), parked.bitmap());

        let (signal, _) = counting_signal();
        image.show_text(Some(LONG_LINE), Some(signal));
        assert!(!image.animation_cancelled());
        image.stop_animation();
    }

    #[test]
    fn test_registered_signal_is_reused() {
        let mut config = builtin_config();
        config.animation.loops = 1;
        config.animation.speed = 18;
        let mut image = image_with(&config);
        image.set_tick_interval(Duration::from_millis(1));

        let (signal, count) = counting_signal();
        image.show_text(Some("short"), Some(signal));
        image.show_text(Some(LONG_LINE), None);
        assert!(wait_for(Duration::from_secs(5), || count.load(Ordering::SeqCst) > 0));
        assert!(wait_until_idle(&image, Duration::from_secs(5)));
    }

    #[test]
    fn test_failing_signal_stops_animation() {
        let mut image = image_with(&builtin_config());
        image.set_tick_interval(Duration::from_millis(1));
        let signal: FrameSignal = Arc::new(|| -> Result<()> { anyhow::bail!("sink gone") });
        image.show_text(Some(LONG_LINE), Some(signal));
        assert!(wait_until_idle(&image, Duration::from_secs(5)));
    }

    #[test]
    fn test_panicking_signal_stops_animation() {
        let mut image = image_with(&builtin_config());
        image.set_tick_interval(Duration::from_millis(1));
        let signal: FrameSignal = Arc::new(|| -> Result<()> { panic!("boom") });
        image.show_text(Some(LONG_LINE), Some(signal));
        assert!(wait_until_idle(&image, Duration::from_secs(5)));
        // The image stays usable after the worker died.
        image.show_text(Some("OK"), None);
        assert_eq!(image.lines()[0], "OK");
    }

    #[test]
    fn test_stop_animation() {
        let mut image = image_with(&builtin_config());
        image.set_tick_interval(Duration::from_millis(20));
        let (signal, _) = counting_signal();
        image.show_text(Some(LONG_LINE), Some(signal));
        assert!(image.is_animating());
        image.stop_animation();
        assert!(!image.is_animating());
    }
}
