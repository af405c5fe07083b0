//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default render parameters used when the command line omits them.
    pub render: RenderDefaults,

    /// Stream encoder timing.
    pub encoder: EncoderTiming,

    /// Per-mode cost budget for the procedural effects.
    pub effects: EffectBudget,

    /// Interactive preview cadence.
    pub preview: PreviewConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Output frame rate.
    pub fps: u32,

    /// Quality preset name (`ultra`, `high`, `medium`, `low`).
    pub quality: String,

    /// Requested container (`mp4` or `webm`).
    pub format: String,

    /// Directory exported artifacts are written to. Relative paths
    /// resolve against the project directory.
    pub output_dir: PathBuf,

    /// Caption font used when a project does not name one. When unset,
    /// the system font directories are searched.
    pub caption_font: Option<PathBuf>,
}

/// Encoder timing knobs. All durations in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderTiming {
    /// ffmpeg executable name or path.
    pub ffmpeg_binary: String,

    /// Interval at which encoder output is delivered as chunks.
    pub chunk_interval_ms: u64,

    /// Delay between priming the encoder and starting playback.
    pub start_grace_ms: u64,

    /// Delay after stop is requested, for trailing output to arrive.
    pub finalize_grace_ms: u64,

    /// Upper bound on waiting for the encoder's stop event.
    pub stop_timeout_ms: u64,

    /// Export loop tick rate as a multiple of the output fps.
    pub pacing_factor: f64,
}

/// Cost budget for the effect generators in each render mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectBudget {
    /// Caps for interactive preview.
    pub preview: EffectProfile,

    /// Caps for export, where every frame must keep up with playback.
    pub export: EffectProfile,
}

/// Population caps and per-frame counts for one render mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectProfile {
    /// Grain specks drawn per frame.
    pub grain_particles: u32,
    /// Largest grain speck edge in pixels at 1080p.
    pub grain_max_size: f32,
    /// Candidate dust specks per frame for the old-film look.
    pub film_specks: u32,
    /// Maximum live scratch marks.
    pub scratch_cap: usize,
    /// Maximum persistent cinema lines.
    pub cinema_line_cap: usize,
    /// Maximum live embers.
    pub ember_cap: usize,
    /// Maximum falling vertical dust streaks.
    pub vertical_dust_cap: usize,
    /// Row interval of the scanline pattern in pixels at 1080p.
    pub scanline_step: u32,
    /// Peak frame jitter in pixels at 1080p.
    pub jitter_px: f32,
    /// Horizontal tear bands per frame for the VHS look.
    pub glitch_bands: u32,
}

/// Interactive preview cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Rate at which the audio source reports its position.
    pub time_update_hz: f64,

    /// Display refresh rate the preview loop draws at.
    pub frame_hz: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelsmith_render_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            quality: "high".to_string(),
            format: "mp4".to_string(),
            output_dir: PathBuf::from("exports"),
            caption_font: None,
        }
    }
}

impl Default for EncoderTiming {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".to_string(),
            chunk_interval_ms: 1000,
            start_grace_ms: 1000,
            finalize_grace_ms: 2000,
            stop_timeout_ms: 15_000,
            pacing_factor: 1.2,
        }
    }
}

impl Default for EffectBudget {
    fn default() -> Self {
        Self {
            preview: EffectProfile::preview(),
            export: EffectProfile::export(),
        }
    }
}

impl EffectProfile {
    /// Dense profile for interactive preview.
    pub fn preview() -> Self {
        Self {
            grain_particles: 8000,
            grain_max_size: 2.0,
            film_specks: 12,
            scratch_cap: 2,
            cinema_line_cap: 5,
            ember_cap: 50,
            vertical_dust_cap: 6,
            scanline_step: 4,
            jitter_px: 5.0,
            glitch_bands: 4,
        }
    }

    /// Lighter profile so export never falls behind real time.
    pub fn export() -> Self {
        Self {
            grain_particles: 1500,
            grain_max_size: 1.5,
            film_specks: 5,
            scratch_cap: 2,
            cinema_line_cap: 3,
            ember_cap: 25,
            vertical_dust_cap: 3,
            scanline_step: 8,
            jitter_px: 2.0,
            glitch_bands: 2,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            time_update_hz: 4.0,
            frame_hz: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
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
}

/// Directories searched for a fallback caption font.
const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/Library/Fonts",
    "/System/Library/Fonts",
    "C:\\Windows\\Fonts",
];

/// Fallback caption fonts, most preferred first.
const FALLBACK_FONT_NAMES: &[&str] = &[
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "NotoSans-Regular.ttf",
    "FreeSans.ttf",
    "Arial.ttf",
    "arial.ttf",
];

/// Subdirectory depth searched below each font directory.
const FONT_SEARCH_DEPTH: usize = 4;

impl RenderDefaults {
    /// The caption font to use when a project names none.
    ///
    /// A configured `caption_font` wins when it exists; otherwise the
    /// system font directories are searched for a known sans-serif face.
    pub fn resolve_caption_font(&self) -> Option<PathBuf> {
        if let Some(path) = &self.caption_font {
            if path.is_file() {
                return Some(path.clone());
            }
            tracing::warn!(path = %path.display(), "Configured caption font does not exist");
        }
        let dirs: Vec<PathBuf> = SYSTEM_FONT_DIRS.iter().map(PathBuf::from).collect();
        find_font(&dirs, FALLBACK_FONT_NAMES)
    }
}

/// First file named in `names` found under `dirs`.
///
/// Names are tried in order, so an earlier name in a later directory beats
/// a later name in an earlier one.
pub fn find_font(dirs: &[PathBuf], names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .find_map(|name| dirs.iter().find_map(|dir| find_file(dir, name, FONT_SEARCH_DEPTH)))
}

fn find_file(dir: &std::path::Path, name: &str, depth: usize) -> Option<PathBuf> {
    let candidate = dir.join(name);
    if candidate.is_file() {
        return Some(candidate);
    }
    if depth == 0 {
        return None;
    }
    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();
    subdirs
        .iter()
        .find_map(|sub| find_file(sub, name, depth - 1))
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
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
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "render": { "fps": 24 }, "encoder": { "chunk_interval_ms": 500 } }"#)
                .unwrap();
        assert_eq!(config.render.fps, 24);
        assert_eq!(config.render.quality, "high");
        assert_eq!(config.encoder.chunk_interval_ms, 500);
        assert_eq!(config.encoder.finalize_grace_ms, 2000);
        assert_eq!(config.effects.export, EffectProfile::export());
    }

    #[test]
    fn test_export_profile_is_lighter_than_preview() {
        let budget = EffectBudget::default();
        assert!(budget.export.grain_particles < budget.preview.grain_particles);
        assert!(budget.export.ember_cap < budget.preview.ember_cap);
        assert!(budget.export.cinema_line_cap < budget.preview.cinema_line_cap);
        assert!(budget.export.scanline_step > budget.preview.scanline_step);
    }

    #[test]
    fn test_find_font_searches_nested_dirs_in_name_order() {
        let root = std::env::temp_dir().join(format!("reelsmith_fonts_{}", std::process::id()));
        let nested = root.join("truetype").join("dejavu");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("DejaVuSans.ttf"), b"x").unwrap();
        std::fs::write(root.join("FreeSans.ttf"), b"x").unwrap();

        let dirs = [PathBuf::from("/nonexistent/reelsmith/fonts"), root.clone()];
        assert_eq!(
            find_font(&dirs, &["DejaVuSans.ttf", "FreeSans.ttf"]),
            Some(nested.join("DejaVuSans.ttf"))
        );
        assert_eq!(
            find_font(&dirs, &["Missing.ttf", "FreeSans.ttf"]),
            Some(root.join("FreeSans.ttf"))
        );
        assert_eq!(find_font(&dirs, &["Missing.ttf"]), None);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_configured_caption_font_wins() {
        let path = std::env::temp_dir().join(format!("reelsmith_caption_font_{}.ttf", std::process::id()));
        std::fs::write(&path, b"x").unwrap();
        let defaults = RenderDefaults {
            caption_font: Some(path.clone()),
            ..RenderDefaults::default()
        };
        assert_eq!(defaults.resolve_caption_font(), Some(path.clone()));
        std::fs::remove_file(&path).ok();
    }
}
