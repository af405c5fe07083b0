//! Render settings for a single export.

use serde::{Deserialize, Serialize};

/// Output container family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Primary target.
    #[default]
    Mp4,
    /// Fallback when no mp4 codec is available.
    Webm,
}

impl ExportFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "webm" => Some(Self::Webm),
            _ => None,
        }
    }

    /// The other format, tried when this one has no usable codec.
    pub fn fallback(self) -> Self {
        match self {
            Self::Mp4 => Self::Webm,
            Self::Webm => Self::Mp4,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }
}

/// Named bitrate presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Ultra,
    High,
    Medium,
    Low,
}

impl QualityPreset {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ultra" => Some(Self::Ultra),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Video bitrate in bits per second.
    pub fn bitrate(self) -> u64 {
        match self {
            Self::Ultra => 25_000_000,
            Self::High => 12_000_000,
            Self::Medium => 6_000_000,
            Self::Low => 3_000_000,
        }
    }
}

/// Settings fixed for the lifetime of one export session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Output base name, without extension.
    pub filename: String,

    /// Output frame rate.
    pub fps: u32,

    /// Video bitrate in bits per second.
    pub bitrate: u64,

    /// Requested container.
    pub format: ExportFormat,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            filename: "reelsmith-export".to_string(),
            fps: 30,
            bitrate: QualityPreset::High.bitrate(),
            format: ExportFormat::Mp4,
        }
    }
}

impl RenderSettings {
    /// Number of frames a timeline of `duration_secs` produces.
    pub fn total_frames(&self, duration_secs: f64) -> u64 {
        if duration_secs <= 0.0 || self.fps == 0 {
            return 0;
        }
        (duration_secs * f64::from(self.fps)).ceil() as u64
    }

    /// Presentation time of frame `index` in seconds.
    pub fn frame_time(&self, index: u64) -> f64 {
        index as f64 / f64::from(self.fps.max(1))
    }
}
