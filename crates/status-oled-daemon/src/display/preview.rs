//! Sink that streams PNG snapshots to preview clients.

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use tracing::info;

use super::image::DisplayImage;
use super::sink::DisplaySink;
use crate::config::Settings;
use crate::rendering::blank_png;

/// Receives `(payload, is_sample)` for every pushed frame.
pub type PushFn = Arc<dyn Fn(Vec<u8>, bool) + Send + Sync>;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encodes PNG bytes as a `data:` URL.
pub fn data_url(png: &[u8]) -> Vec<u8> {
    let mut payload = DATA_URL_PREFIX.as_bytes().to_vec();
    payload.extend_from_slice(STANDARD.encode(png).as_bytes());
    payload
}

/// Pushes base64 PNG frames through a callback.
pub struct PreviewSink {
    image: Arc<DisplayImage>,
    push: PushFn,
    enabled: bool,
    is_sample: bool,
}

impl PreviewSink {
    pub fn new(image: Arc<DisplayImage>, push: PushFn, enabled: bool, is_sample: bool) -> Self {
        let mut sink = Self {
            image,
            push,
            enabled,
            is_sample,
        };
        if let Err(e) = sink.clear() {
            tracing::warn!("Failed to clear preview: {}", e);
        }
        sink
    }
}

impl DisplaySink for PreviewSink {
    fn name(&self) -> &'static str {
        if self.is_sample {
            "sample-preview"
        } else {
            "preview"
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn clear(&mut self) -> Result<()> {
        (self.push)(data_url(&blank_png()?), self.is_sample);
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let png = self.image.encoded_buffer()?;
        (self.push)(data_url(&png), self.is_sample);
        Ok(())
    }

    fn apply_settings(&mut self, settings: &Settings) -> Result<()> {
        self.enabled = settings.software_display.enabled;
        info!("Software display set to enabled {}", self.enabled);
        self.update()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DisplayConfig, FontConfig};
    use std::path::Path;
    use std::sync::Mutex;

    type Pushed = Arc<Mutex<Vec<(Vec<u8>, bool)>>>;

    fn recorder() -> (PushFn, Pushed) {
        let pushed: Pushed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&pushed);
        let push: PushFn = Arc::new(move |payload: Vec<u8>, is_sample: bool| {
            sink.lock().unwrap().push((payload, is_sample));
        });
        (push, pushed)
    }

    fn test_image() -> Arc<DisplayImage> {
        let config = DisplayConfig {
            font: FontConfig::builtin(),
            secondary_font: FontConfig::builtin(),
            ..DisplayConfig::default()
        };
        Arc::new(DisplayImage::new(Path::new("/nonexistent"), &config, None))
    }

    fn decode(payload: &[u8]) -> image::RgbaImage {
        let text = std::str::from_utf8(payload).unwrap();
        let encoded = text.strip_prefix(DATA_URL_PREFIX).unwrap();
        let png = STANDARD.decode(encoded).unwrap();
        image::load_from_memory(&png).unwrap().to_rgba8()
    }

    #[test]
    fn test_update_pushes_current_frame() {
        let image = test_image();
        let (push, pushed) = recorder();
        let mut sink = PreviewSink::new(Arc::clone(&image), push, true, false);
        image.show_text(Some("HELLO"), None);
        sink.update().unwrap();

        let pushed = pushed.lock().unwrap();
        assert_eq!(pushed.len(), 2);
        let (payload, is_sample) = &pushed[1];
        assert!(!is_sample);
        assert_eq!(decode(payload), image.translucent_image());
    }

    #[test]
    fn test_disabled_sink_still_clears() {
        let image = test_image();
        let (push, pushed) = recorder();
        let mut sink = PreviewSink::new(Arc::clone(&image), push, false, true);
        image.show_text(Some("HELLO"), None);
        sink.update().unwrap();
        sink.clear().unwrap();

        let pushed = pushed.lock().unwrap();
        assert_eq!(pushed.len(), 2);
        for (payload, is_sample) in pushed.iter() {
            assert!(is_sample);
            let frame = decode(payload);
            assert!(frame.pixels().all(|p| p.0 == [0, 0, 0, 255]));
        }
    }

    #[test]
    fn test_apply_settings_toggles() {
        let (push, pushed) = recorder();
        let mut sink = PreviewSink::new(test_image(), push, true, false);
        let mut settings = Settings::default();
        settings.software_display.enabled = false;
        sink.apply_settings(&settings).unwrap();
        assert!(!sink.is_enabled());
        assert_eq!(pushed.lock().unwrap().len(), 1);
    }
}
