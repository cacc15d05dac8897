//! Font resolution.
//!
//! Two kinds of fonts are supported: TrueType/OpenType files loaded with
//! fontdue, which report a full bounding box, and the built-in
//! embedded-graphics mono font, which only knows its cell size.

use embedded_graphics::mono_font::{ascii::FONT_6X10, MonoFont};
use fontdue::FontSettings;
use status_oled_hw::PANEL_HEIGHT;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::FontConfig;

/// Font name that always selects the built-in font.
pub const DEFAULT_FONT_NAME: &str = "default";

/// Largest rasterized font size; nothing taller fits the panel.
const MAX_FONT_SIZE: u32 = PANEL_HEIGHT;

/// A resolved font ready for measuring and drawing.
#[derive(Clone)]
pub enum Font {
    /// Built-in bitmap font (width/height metrics only).
    Builtin(&'static MonoFont<'static>),
    /// Scalable font rasterized at `size` pixels.
    Vector { face: Arc<fontdue::Font>, size: f32 },
}

impl Font {
    /// The built-in default font.
    pub fn builtin() -> Self {
        Font::Builtin(&FONT_6X10)
    }

    /// Resolves a font selection against `font_dir`.
    ///
    /// Falls back to the built-in font when the name is unset or `"default"`,
    /// the size is unset, or the file cannot be read or parsed.
    pub fn load(font_dir: &Path, config: &FontConfig) -> Self {
        let (name, size) = match (config.name.as_deref(), config.size) {
            (Some(name), Some(size)) if name != DEFAULT_FONT_NAME && size > 0 => (name, size),
            _ => return Self::builtin(),
        };

        let Some(path) = font_path(font_dir, name) else {
            warn!("Font name {:?} is not a file name, using built-in font", name);
            return Self::builtin();
        };
        let size = clamp_size(size);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    "Font {:?} unavailable ({}), using built-in font",
                    path, e
                );
                return Self::builtin();
            }
        };

        let settings = FontSettings {
            scale: size as f32,
            ..FontSettings::default()
        };
        match fontdue::Font::from_bytes(bytes, settings) {
            Ok(face) => {
                debug!("Loaded font {} at {}px", name, size);
                Font::Vector {
                    face: Arc::new(face),
                    size: size as f32,
                }
            }
            Err(e) => {
                warn!("Font {} could not be parsed ({}), using built-in font", name, e);
                Self::builtin()
            }
        }
    }

    /// Returns true for the built-in font.
    #[cfg(test)]
    pub fn is_builtin(&self) -> bool {
        matches!(self, Font::Builtin(_))
    }
}

impl std::fmt::Debug for Font {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Font::Builtin(font) => write!(
                f,
                "Builtin({}x{})",
                font.character_size.width, font.character_size.height
            ),
            Font::Vector { size, .. } => write!(f, "Vector({}px)", size),
        }
    }
}

fn clamp_size(size: u32) -> u32 {
    size.min(MAX_FONT_SIZE)
}

/// Path of the font file `name` inside `font_dir`.
///
/// Only a bare file name is accepted, so a selection cannot leave the font
/// directory.
fn font_path(font_dir: &Path, name: &str) -> Option<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(file)), None) => Some(font_dir.join(file)),
        _ => None,
    }
}

/// Lists the font files available in `font_dir`, sorted by name.
pub fn available_fonts(font_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(font_dir) else {
        return Vec::new();
    };

    let mut fonts: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.ends_with(".ttf") || lower.ends_with(".otf")
        })
        .collect();
    fonts.sort();
    fonts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_path_stays_in_font_dir() {
        let dir = Path::new("/srv/fonts");
        assert_eq!(
            font_path(dir, "Ubuntu-Bold.ttf"),
            Some(PathBuf::from("/srv/fonts/Ubuntu-Bold.ttf"))
        );
        for name in ["../secret.ttf", "/etc/passwd", "sub/Font.ttf", "", ".", ".."] {
            assert_eq!(font_path(dir, name), None, "{:?}", name);
        }
    }

    #[test]
    fn test_size_is_capped_at_panel_height() {
        assert_eq!(clamp_size(11), 11);
        assert_eq!(clamp_size(64), 64);
        assert_eq!(clamp_size(u32::MAX), 64);
    }

    #[test]
    fn test_escaping_name_selects_builtin() {
        let dir = scratch_dir("escape");
        let inner = dir.join("inner");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(dir.join("Outside.ttf"), b"not a font").unwrap();
        let font = Font::load(&inner, &FontConfig::new("../Outside.ttf", 11));
        assert!(font.is_builtin());
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "status-oled-font-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_name_selects_builtin() {
        let dir = Path::new("/nonexistent");
        assert!(Font::load(dir, &FontConfig::new("default", 11)).is_builtin());
        assert!(Font::load(dir, &FontConfig::builtin()).is_builtin());
        let no_size = FontConfig {
            name: Some("Ubuntu-Bold.ttf".into()),
            size: None,
        };
        assert!(Font::load(dir, &no_size).is_builtin());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let font = Font::load(Path::new("/nonexistent"), &FontConfig::new("Nope.ttf", 11));
        assert!(font.is_builtin());
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let dir = scratch_dir("corrupt");
        std::fs::write(dir.join("Broken.ttf"), b"not a font").unwrap();
        let font = Font::load(&dir, &FontConfig::new("Broken.ttf", 11));
        assert!(font.is_builtin());
    }

    #[test]
    fn test_available_fonts_filters_and_sorts() {
        let dir = scratch_dir("list");
        for name in ["b.ttf", "a.OTF", "readme.txt"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        assert_eq!(available_fonts(&dir), vec!["a.OTF", "b.ttf"]);
        assert!(available_fonts(Path::new("/nonexistent")).is_empty());
    }
}
