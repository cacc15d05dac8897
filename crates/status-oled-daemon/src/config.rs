//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding TrueType/OpenType font files
    #[serde(default = "default_font_dir")]
    pub font_dir: PathBuf,

    /// Web server configuration
    #[serde(default)]
    pub web: WebConfig,

    /// D-Bus configuration
    #[serde(default)]
    pub dbus: DbusConfig,

    /// Runtime-adjustable display settings
    #[serde(flatten)]
    pub settings: Settings,
}

/// Settings that can be replaced while the daemon runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Rendering configuration shared by every sink
    #[serde(default)]
    pub display: DisplayConfig,

    /// Physical OLED panel
    #[serde(default)]
    pub hardware_display: HardwareDisplayConfig,

    /// Web preview stream
    #[serde(default)]
    pub software_display: SoftwareDisplayConfig,

    /// Verbose logging for the display engine
    #[serde(default)]
    pub debug: bool,
}

/// Font selection; `name` of `None` or `"default"` selects the built-in font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub size: Option<u32>,
}

impl FontConfig {
    pub fn new(name: &str, size: u32) -> Self {
        Self {
            name: Some(name.to_string()),
            size: Some(size),
        }
    }

    /// The built-in bitmap font.
    #[cfg(test)]
    pub fn builtin() -> Self {
        Self {
            name: None,
            size: None,
        }
    }
}

/// Marquee animation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    /// Number of full scroll passes for overflowing text (0 disables scrolling)
    #[serde(default = "default_animation_loops")]
    pub loops: u32,

    /// Pixels moved per animation tick
    #[serde(default = "default_animation_speed")]
    pub speed: u32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            loops: default_animation_loops(),
            speed: default_animation_speed(),
        }
    }
}

/// Progress bar settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressBarConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Separates the fill from the frame with an unlit ring
    #[serde(default)]
    pub outline: bool,

    /// Bar height in pixels (clamped to 4..=64 when drawn)
    #[serde(default = "default_progress_bar_size")]
    pub size: u32,
}

impl Default for ProgressBarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            outline: false,
            size: default_progress_bar_size(),
        }
    }
}

/// Rendering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Font for the most recent line
    #[serde(default = "default_font")]
    pub font: FontConfig,

    /// Font for every older line
    #[serde(default = "default_secondary_font")]
    pub secondary_font: FontConfig,

    #[serde(default)]
    pub animation: AnimationConfig,

    #[serde(default)]
    pub progress_bar: ProgressBarConfig,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            font: default_font(),
            secondary_font: default_secondary_font(),
            animation: AnimationConfig::default(),
            progress_bar: ProgressBarConfig::default(),
        }
    }
}

/// Physical panel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareDisplayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub rotated_180: bool,

    /// I2C bus device node
    #[serde(default = "default_i2c_bus")]
    pub bus: String,

    /// 7-bit I2C address of the panel
    #[serde(default = "default_i2c_address")]
    pub address: u8,
}

impl Default for HardwareDisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rotated_180: false,
            bus: default_i2c_bus(),
            address: default_i2c_address(),
        }
    }
}

/// Web preview configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwareDisplayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lit-pixel color used by preview clients (hex, no '#')
    #[serde(default = "default_preview_color")]
    pub color: String,
}

impl Default for SoftwareDisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            color: default_preview_color(),
        }
    }
}

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Server listen address (e.g., "0.0.0.0:8686")
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enable: true,
            listen: default_listen(),
        }
    }
}

/// D-Bus bus selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbusBusType {
    Session,
    System,
    /// Try session first, fall back to system.
    #[default]
    Auto,
}

/// D-Bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DbusConfig {
    #[serde(default)]
    pub bus: DbusBusType,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_font_dir() -> PathBuf {
    PathBuf::from("fonts")
}

fn default_font() -> FontConfig {
    FontConfig::new("Ubuntu-Bold.ttf", 11)
}

fn default_secondary_font() -> FontConfig {
    FontConfig::new("Ubuntu-Regular.ttf", 8)
}

fn default_animation_loops() -> u32 {
    2
}

fn default_animation_speed() -> u32 {
    3
}

fn default_progress_bar_size() -> u32 {
    4
}

fn default_i2c_bus() -> String {
    status_oled_hw::DEFAULT_I2C_BUS.to_string()
}

fn default_i2c_address() -> u8 {
    status_oled_hw::DEFAULT_I2C_ADDRESS
}

fn default_preview_color() -> String {
    "00ffff".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:8686".to_string()
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font_dir: default_font_dir(),
            web: WebConfig::default(),
            dbus: DbusConfig::default(),
            settings: Settings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        let display = &config.settings.display;
        assert_eq!(display.font, FontConfig::new("Ubuntu-Bold.ttf", 11));
        assert_eq!(
            display.secondary_font,
            FontConfig::new("Ubuntu-Regular.ttf", 8)
        );
        assert_eq!(display.animation.loops, 2);
        assert_eq!(display.animation.speed, 3);
        assert!(display.progress_bar.enabled);
        assert!(!display.progress_bar.outline);
        assert_eq!(display.progress_bar.size, 4);
        assert!(config.settings.hardware_display.enabled);
        assert!(!config.settings.hardware_display.rotated_180);
        assert_eq!(config.settings.hardware_display.address, 0x3C);
        assert!(config.settings.software_display.enabled);
        assert!(!config.settings.debug);
        assert_eq!(config.dbus.bus, DbusBusType::Auto);
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str(
            r#"
            debug = true
            font_dir = "/usr/share/fonts/truetype/ubuntu"

            [display.font]
            name = "default"

            [display.animation]
            loops = 0

            [hardware_display]
            rotated_180 = true

            [dbus]
            bus = "system"
            "#,
        )
        .unwrap();
        assert!(config.settings.debug);
        assert_eq!(
            config.font_dir,
            PathBuf::from("/usr/share/fonts/truetype/ubuntu")
        );
        assert_eq!(config.settings.display.font.name.as_deref(), Some("default"));
        assert_eq!(config.settings.display.font.size, None);
        assert_eq!(config.settings.display.animation.loops, 0);
        assert_eq!(config.settings.display.animation.speed, 3);
        assert!(config.settings.hardware_display.rotated_180);
        assert_eq!(config.settings.hardware_display.bus, "/dev/i2c-1");
        assert_eq!(config.dbus.bus, DbusBusType::System);
    }

    #[test]
    fn test_settings_json_round_trip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }
}
