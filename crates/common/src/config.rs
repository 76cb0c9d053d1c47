//! Application configuration.
//!
//! Loaded from `$XDG_CONFIG_HOME/reelsmith/config.json` when present. Every
//! field has a default matching the blank project template, so a missing or
//! partial file is never fatal.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::clock::FrameRate;
use crate::error::{ForgeError, ForgeResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Defaults for new documents and clip durations.
    pub timeline: TimelineDefaults,

    /// Title overlay appearance.
    pub title: TitleDefaults,

    /// External duration probe settings.
    pub probe: ProbeConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Sequence format and duration defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineDefaults {
    /// Document format version written to the root element.
    pub version: String,

    /// Frame duration of new sequences (e.g. "1001/24000s").
    pub frame_duration: String,

    /// Format name of the sequence format.
    pub format_name: String,

    pub width: u32,
    pub height: u32,

    /// Color space of the sequence format.
    pub color_space: String,

    /// Duration given to still images when none is requested (seconds).
    pub still_duration_secs: f64,

    /// Wrap video-with-audio clips in compound media instead of nesting lanes.
    pub compound_audio: bool,
}

/// Title overlay defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleDefaults {
    pub effect_name: String,
    pub effect_uid: String,
    pub font: String,
    pub font_size: u32,
    /// RGBA, space separated, 0..1.
    pub font_color: String,
}

/// Duration probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe binary name or path.
    pub ffprobe: String,

    /// Maximum concurrent probe processes for batch builds.
    pub parallelism: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelsmith_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for TimelineDefaults {
    fn default() -> Self {
        Self {
            version: "1.13".to_string(),
            frame_duration: FrameRate::NTSC_23_976.to_string(),
            format_name: "FFVideoFormat720p2398".to_string(),
            width: 1280,
            height: 720,
            color_space: "1-1-1 (Rec. 709)".to_string(),
            still_duration_secs: 10.0,
            compound_audio: false,
        }
    }
}

impl Default for TitleDefaults {
    fn default() -> Self {
        Self {
            effect_name: "Text".to_string(),
            effect_uid:
                ".../Titles.localized/Basic Text.localized/Text.localized/Text.moti".to_string(),
            font: "Helvetica Neue".to_string(),
            font_size: 196,
            font_color: "1 1 1 1".to_string(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffprobe: "ffprobe".to_string(),
            parallelism: 8,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl TimelineDefaults {
    /// Parsed frame rate of new sequences.
    pub fn frame_rate(&self) -> ForgeResult<FrameRate> {
        self.frame_duration
            .parse()
            .map_err(|e| ForgeError::config(format!("timeline.frame_duration: {e}")))
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load and validate config from an explicit path.
    pub fn load_from(path: &Path) -> ForgeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values that would produce an unusable document.
    pub fn validate(&self) -> ForgeResult<()> {
        self.timeline.frame_rate()?;
        if !self.timeline.still_duration_secs.is_finite() || self.timeline.still_duration_secs <= 0.0 {
            return Err(ForgeError::config(
                "timeline.still_duration_secs must be a positive number",
            ));
        }
        if self.timeline.width == 0 || self.timeline.height == 0 {
            return Err(ForgeError::config("timeline dimensions must be non-zero"));
        }
        if self.probe.parallelism == 0 {
            return Err(ForgeError::config("probe.parallelism must be at least 1"));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelsmith").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_blank_template() {
        let config = AppConfig::default();
        assert_eq!(config.timeline.frame_rate().unwrap(), FrameRate::NTSC_23_976);
        assert_eq!(config.timeline.version, "1.13");
        assert_eq!(config.title.font_size, 196);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = std::env::temp_dir().join("reelsmith_test_config_partial");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{ "timeline": { "frame_duration": "1/25s" } }"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.timeline.frame_rate().unwrap().timescale(), 25);
        assert_eq!(config.timeline.width, 1280);
        assert_eq!(config.probe.ffprobe, "ffprobe");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.timeline.frame_duration = "fast".to_string();
        assert!(matches!(config.validate(), Err(ForgeError::Config { .. })));

        let mut config = AppConfig::default();
        config.timeline.still_duration_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.probe.parallelism = 0;
        assert!(config.validate().is_err());
    }
}
