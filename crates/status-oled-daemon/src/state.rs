//! Application state management.
//!
//! [`AppState`] owns the status image, the sinks mirroring it and the sample
//! image used by the settings preview, and translates host events into
//! image updates.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use status_oled_hw::{panel, PANEL_HEIGHT, PANEL_WIDTH};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{
    AnimationConfig, Config, DisplayConfig, FontConfig, ProgressBarConfig, Settings,
};
use crate::display::{
    DisplayImage, DisplaySink, FrameSignal, HardwarePanelSink, PanelOpener, PreviewSink, PushFn,
    ANIMATION_SPEED_XFAST, ANIMATION_SPEED_XSLOW,
};
use crate::gcode;
use crate::printer::{JobTracker, PrinterEvent, PrinterState};
use crate::rendering::available_fonts;

type SinkList = Arc<Mutex<Vec<Box<dyn DisplaySink>>>>;

/// A frame pushed to preview clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewFrame {
    /// `data:image/png;base64,...` URL of the frame.
    pub display: String,
    #[serde(rename = "isSample")]
    pub is_sample: bool,
}

/// Parameters of a settings-preview render.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleQuery {
    pub sample: Option<String>,
    pub font_name: Option<String>,
    pub font_size: Option<u32>,
    pub sec_font_name: Option<String>,
    pub sec_font_size: Option<u32>,
    pub anim_loops: Option<u32>,
    pub anim_speed: Option<u32>,
    pub progbar_enabled: Option<String>,
    pub progbar_outline: Option<String>,
    pub progbar_size: Option<u32>,
    pub text: Option<String>,
}

impl SampleQuery {
    fn is_complete(&self) -> bool {
        self.sample.is_some() && self.font_name.is_some() && self.font_size.is_some()
    }

    /// Sample display settings; unset values fall back to `current`.
    fn display_config(&self, current: &DisplayConfig) -> DisplayConfig {
        let flag = |value: &Option<String>| value.as_ref().map(|v| v.eq_ignore_ascii_case("true"));
        DisplayConfig {
            font: FontConfig {
                name: self.font_name.clone(),
                size: self.font_size,
            },
            secondary_font: FontConfig {
                name: self.sec_font_name.clone(),
                size: self.sec_font_size,
            },
            animation: AnimationConfig {
                loops: self.anim_loops.unwrap_or(current.animation.loops),
                speed: self.anim_speed.unwrap_or(current.animation.speed),
            },
            progress_bar: ProgressBarConfig {
                enabled: flag(&self.progbar_enabled).unwrap_or(false),
                outline: flag(&self.progbar_outline).unwrap_or(current.progress_bar.outline),
                size: self.progbar_size.unwrap_or(current.progress_bar.size),
            },
        }
    }
}

/// Static display facts for clients.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayInfo {
    pub display_width: u32,
    pub display_height: u32,
    pub anim_speed_xslow: u32,
    pub anim_speed_xfast: u32,
    pub debug: bool,
    pub panel_available: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pushes the current frame to every enabled sink.
fn update_sinks(sinks: &mut [Box<dyn DisplaySink>]) -> Result<()> {
    let mut failed = None;
    for sink in sinks.iter_mut() {
        if !sink.is_enabled() {
            continue;
        }
        if let Err(e) = sink.update() {
            warn!("Failed to update {} display: {:#}", sink.name(), e);
            failed = Some(sink.name());
        }
    }
    match failed {
        Some(name) => anyhow::bail!("{} display update failed", name),
        None => Ok(()),
    }
}

/// Shared application state.
pub struct AppState {
    /// Configuration
    config: RwLock<Config>,

    /// Status image shown on every sink
    image: Arc<DisplayImage>,

    /// Sinks mirroring the status image, in update order
    sinks: SinkList,

    /// Image rendered for settings previews
    sample_image: Arc<DisplayImage>,
    sample_sink: Arc<Mutex<PreviewSink>>,

    /// Printer job state
    jobs: Arc<JobTracker>,

    /// Preview frames for connected web clients
    preview_tx: broadcast::Sender<PreviewFrame>,

    /// Whether the I2C bus was available at startup
    panel_available: bool,
}

impl AppState {
    /// Creates the state, probing the configured I2C bus for the panel.
    pub fn new(config: Config) -> Result<Self> {
        let hw = config.settings.hardware_display.clone();
        let available = panel::i2c_available(&hw.bus);
        let opener: PanelOpener = Box::new(move || panel::open_i2c(&hw.bus, hw.address));
        Self::with_panel(config, available, opener)
    }

    /// Creates the state with an explicit bus availability and panel opener.
    pub fn with_panel(config: Config, panel_available: bool, opener: PanelOpener) -> Result<Self> {
        if !config.font_dir.is_dir() {
            warn!(
                "Font directory {:?} not found, only the built-in font is available",
                config.font_dir
            );
        }

        let (preview_tx, _) = broadcast::channel(16);
        let push = preview_push(preview_tx.clone());

        let jobs = Arc::new(JobTracker::new());
        let printer: Arc<dyn PrinterState> = jobs.clone();
        let settings = &config.settings;

        let image = Arc::new(DisplayImage::new(
            &config.font_dir,
            &settings.display,
            Some(printer),
        ));

        let hardware = HardwarePanelSink::new(
            Arc::clone(&image),
            panel_available,
            &settings.hardware_display,
            opener,
        );
        let preview = PreviewSink::new(
            Arc::clone(&image),
            Arc::clone(&push),
            settings.software_display.enabled,
            false,
        );
        let sinks: Vec<Box<dyn DisplaySink>> = vec![Box::new(hardware), Box::new(preview)];

        let sample_image = Arc::new(DisplayImage::new(
            &config.font_dir,
            &settings.display,
            None,
        ));
        let sample_sink = PreviewSink::new(Arc::clone(&sample_image), push, true, true);

        info!(
            "Display ready ({}x{}, panel {})",
            PANEL_WIDTH,
            PANEL_HEIGHT,
            if panel_available { "present" } else { "absent" }
        );

        Ok(Self {
            config: RwLock::new(config),
            image,
            sinks: Arc::new(Mutex::new(sinks)),
            sample_image,
            sample_sink: Arc::new(Mutex::new(sample_sink)),
            jobs,
            preview_tx,
            panel_available,
        })
    }

    /// Returns a copy of the configuration.
    pub fn config(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the runtime settings.
    pub fn settings(&self) -> Settings {
        self.config().settings
    }

    fn font_dir(&self) -> PathBuf {
        self.config().font_dir
    }

    /// Frame signal that mirrors every animation frame to the sinks.
    ///
    /// Frames of a marquee stopped by [`Self::clear_all_displays`] are
    /// dropped; the check runs under the sinks lock the clear holds.
    fn frame_signal(&self) -> FrameSignal {
        let sinks = Arc::clone(&self.sinks);
        let image: Weak<DisplayImage> = Arc::downgrade(&self.image);
        Arc::new(move || {
            let mut sinks = lock(&sinks);
            match image.upgrade() {
                Some(image) if !image.animation_cancelled() => update_sinks(&mut sinks),
                _ => Ok(()),
            }
        })
    }

    /// Pushes the initial frame after startup.
    pub fn startup(&self) {
        self.update_active_displays();
    }

    /// Shows a status message; an empty message clears every display.
    pub fn show_status(&self, text: &str) {
        if text.is_empty() {
            info!("Empty status message, clearing display");
            self.clear_all_displays();
            return;
        }

        info!("Displaying '{}'", text);
        self.image.show_text(Some(text), Some(self.frame_signal()));
        self.image.show_progress(None);
        self.update_active_displays();
    }

    /// Handles a G-code line; returns true if it was a status command.
    pub fn handle_gcode(&self, line: &str) -> bool {
        match gcode::parse_status_command(line) {
            Some(text) => {
                self.show_status(&text);
                true
            }
            None => {
                debug!("Ignoring G-code '{}'", line.trim());
                false
            }
        }
    }

    /// Updates the print progress in percent.
    pub fn set_progress(&self, progress: f32) {
        self.image.show_progress(Some(progress));
        self.update_active_displays();
    }

    /// Current print progress in percent.
    pub fn progress(&self) -> f32 {
        self.image.progress()
    }

    /// Queued status lines, most recent first.
    pub fn lines(&self) -> Vec<String> {
        self.image.lines()
    }

    /// Reacts to a printer lifecycle event.
    pub fn handle_event(&self, event: PrinterEvent) {
        if self.jobs.observe(event) {
            debug!("Printer ready: {}", self.jobs.is_ready());
        }
        if event == PrinterEvent::Shutdown {
            self.clear_all_displays();
        }
    }

    /// Replaces the runtime settings and re-configures the image and sinks.
    pub fn apply_settings(&self, settings: Settings) {
        {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            config.settings = settings.clone();
        }

        self.image.configure(&settings.display);
        for sink in lock(&self.sinks).iter_mut() {
            if let Err(e) = sink.apply_settings(&settings) {
                warn!("Failed to apply settings to {} display: {:#}", sink.name(), e);
            }
        }
        info!("Settings applied");
    }

    /// Stops the animation and blanks every sink.
    pub fn clear_all_displays(&self) {
        let mut sinks = lock(&self.sinks);
        self.image.stop_animation();
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.clear() {
                warn!("Failed to clear {} display: {:#}", sink.name(), e);
            }
        }
    }

    /// Pushes the current frame to every enabled sink.
    pub fn update_active_displays(&self) {
        // Failures are logged per sink.
        let _ = update_sinks(&mut lock(&self.sinks));
    }

    /// Returns the current frame as PNG bytes.
    pub fn screen_png(&self) -> Result<Vec<u8>> {
        self.image
            .encoded_buffer()
            .context("Failed to encode display")
    }

    /// Renders a settings preview, or the current frame when the query is
    /// incomplete.
    pub fn render_sample(&self, query: &SampleQuery) -> Result<Vec<u8>> {
        if !query.is_complete() {
            return self.screen_png();
        }

        let config = query.display_config(&self.settings().display);
        debug!("Rendering sample with {:?}", config);

        let sink = Arc::clone(&self.sample_sink);
        let signal: FrameSignal = Arc::new(move || lock(&sink).update());

        self.sample_image.reset();
        self.sample_image.configure(&config);
        self.sample_image
            .show_text(Some(query.text.as_deref().unwrap_or("")), Some(signal));
        self.sample_image
            .show_progress(Some(current_second() as f32 / 60.0 * 100.0));

        self.sample_image
            .encoded_buffer()
            .context("Failed to encode sample")
    }

    /// Static display facts.
    pub fn info(&self) -> DisplayInfo {
        DisplayInfo {
            display_width: PANEL_WIDTH,
            display_height: PANEL_HEIGHT,
            anim_speed_xslow: ANIMATION_SPEED_XSLOW,
            anim_speed_xfast: ANIMATION_SPEED_XFAST,
            debug: self.settings().debug,
            panel_available: self.panel_available,
        }
    }

    /// Returns true if the hardware panel is open and enabled.
    pub fn is_panel_connected(&self) -> bool {
        lock(&self.sinks)
            .iter()
            .any(|sink| sink.name() == "hardware" && sink.is_enabled())
    }

    /// Font files available for selection.
    pub fn fonts(&self) -> Vec<String> {
        available_fonts(&self.font_dir())
    }

    /// Subscribes to preview frames.
    pub fn subscribe_preview(&self) -> broadcast::Receiver<PreviewFrame> {
        self.preview_tx.subscribe()
    }

    /// Blanks every display before exit.
    pub fn shutdown(&self) {
        info!("Clearing displays");
        self.clear_all_displays();
        self.sample_image.stop_animation();
    }
}

fn preview_push(tx: broadcast::Sender<PreviewFrame>) -> PushFn {
    Arc::new(move |payload: Vec<u8>, is_sample: bool| {
        let frame = PreviewFrame {
            display: String::from_utf8_lossy(&payload).into_owned(),
            is_sample,
        };
        // No subscribers is not an error.
        let _ = tx.send(frame);
    })
}

fn current_second() -> u32 {
    use chrono::Timelike;
    chrono::Local::now().second()
}

#[cfg(test)]
mod tests {
    use super::*;
    use status_oled_hw::PanelDevice;

    fn test_config() -> Config {
        let mut config = Config {
            font_dir: PathBuf::from("/nonexistent"),
            ..Config::default()
        };
        config.settings.display.font = FontConfig::builtin();
        config.settings.display.secondary_font = FontConfig::builtin();
        config
    }

    fn no_panel() -> PanelOpener {
        Box::new(|| -> status_oled_hw::Result<Box<dyn PanelDevice>> {
            Err(status_oled_hw::Error::Unsupported)
        })
    }

    fn test_state() -> AppState {
        AppState::with_panel(test_config(), false, no_panel()).unwrap()
    }

    fn drain(rx: &mut broadcast::Receiver<PreviewFrame>) -> Vec<PreviewFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_fitting_status_updates_once() {
        let state = test_state();
        let mut rx = state.subscribe_preview();
        state.show_status("HELLO");

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].is_sample);
        assert!(frames[0].display.starts_with("data:image/png;base64,"));
        assert_eq!(state.lines(), vec!["HELLO"]);
    }

    #[test]
    fn test_empty_status_clears() {
        let state = test_state();
        state.show_status("HELLO");
        let mut rx = state.subscribe_preview();
        state.show_status("");

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        let encoded = frames[0]
            .display
            .strip_prefix("data:image/png;base64,")
            .unwrap();
        let png = STANDARD.decode(encoded).unwrap();
        assert_eq!(png, crate::rendering::blank_png().unwrap());
    }

    #[test]
    fn test_clear_drops_late_animation_frames() {
        let state = test_state();
        let late_frame = state.frame_signal();
        state.show_status("A STATUS LINE MUCH TOO WIDE FOR THE PANEL");
        state.clear_all_displays();

        let mut rx = state.subscribe_preview();
        late_frame().unwrap();
        assert!(drain(&mut rx).is_empty());

        // A new status is pushed again.
        state.show_status("HELLO");
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_gcode_routing() {
        let state = test_state();
        assert!(state.handle_gcode("M117 Heating"));
        assert!(!state.handle_gcode("G1 X10"));
        assert_eq!(state.lines(), vec!["Heating"]);
    }

    #[test]
    fn test_progress_and_events() {
        let state = test_state();
        state.set_progress(150.0);
        assert_eq!(state.progress(), 100.0);

        state.handle_event(PrinterEvent::PrintStarted);
        assert!(!state.jobs.is_ready());

        let mut rx = state.subscribe_preview();
        state.handle_event(PrinterEvent::Shutdown);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_disabled_preview_stops_updates() {
        let state = test_state();
        let mut settings = state.settings();
        settings.software_display.enabled = false;
        state.apply_settings(settings);
        assert!(!state.settings().software_display.enabled);

        let mut rx = state.subscribe_preview();
        state.show_status("HELLO");
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_incomplete_sample_returns_screen() {
        let state = test_state();
        state.show_status("HELLO");
        let png = state.render_sample(&SampleQuery::default()).unwrap();
        assert_eq!(png, state.screen_png().unwrap());
    }

    #[test]
    fn test_sample_render_uses_own_image() {
        let state = test_state();
        state.show_status("LIVE");
        let query = SampleQuery {
            sample: Some("1".into()),
            font_name: Some("default".into()),
            font_size: Some(11),
            text: Some("SAMPLE".into()),
            ..SampleQuery::default()
        };
        let first = state.render_sample(&query).unwrap();
        assert_ne!(first, state.screen_png().unwrap());
        assert_eq!(state.lines(), vec!["LIVE"]);
        // The sample queue restarts on every request.
        state.render_sample(&query).unwrap();
        assert_eq!(state.sample_image.lines(), vec!["SAMPLE"]);
    }

    #[test]
    fn test_sample_query_defaults() {
        let query = SampleQuery {
            progbar_outline: Some("TRUE".into()),
            ..SampleQuery::default()
        };
        let config = query.display_config(&DisplayConfig::default());
        assert!(!config.progress_bar.enabled);
        assert!(config.progress_bar.outline);
        assert_eq!(config.animation.loops, 2);
        assert_eq!(config.secondary_font, FontConfig::builtin());
    }

    #[test]
    fn test_info_and_panel() {
        let state = test_state();
        let info = state.info();
        assert_eq!((info.display_width, info.display_height), (128, 64));
        assert_eq!((info.anim_speed_xslow, info.anim_speed_xfast), (1, 18));
        assert!(!info.panel_available);
        assert!(!state.is_panel_connected());
    }

    #[test]
    fn test_preview_frame_json() {
        let frame = PreviewFrame {
            display: "data:".into(),
            is_sample: true,
        };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"display":"data:","isSample":true}"#
        );
    }
}
