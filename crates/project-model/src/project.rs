//! Project metadata and configuration types.
//!
//! A project is the top-level container that ties together the audio track,
//! the background image sequence, overlay graphics, captions, and the look
//! applied on top of them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::caption::{load_captions, Caption};
use crate::color::Rgba8;
use crate::effect::{default_effect_slots, EffectSlot};

/// Name of the project file inside a project directory.
pub const PROJECT_FILE: &str = "project.json";

/// Top-level project file (`project.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Schema version.
    pub version: String,

    /// Human-readable project name.
    pub name: String,

    /// Unique project identifier.
    pub id: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last modified timestamp (ISO 8601).
    pub modified_at: String,

    /// Source media (relative to project root).
    #[serde(default)]
    pub assets: Assets,

    /// Background sequence timing and motion.
    #[serde(default)]
    pub slideshow: SlideshowSettings,

    /// Caption appearance.
    #[serde(default)]
    pub caption_style: CaptionStyle,

    /// Ordered effect stack.
    #[serde(default = "default_effect_slots")]
    pub effects: Vec<EffectSlot>,

    /// Output raster size.
    #[serde(default)]
    pub canvas: CanvasSize,
}

/// References to source media files (relative to project root).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Assets {
    /// The single audio track driving the timeline.
    pub audio: Option<String>,

    /// Background images, in display order.
    pub images: Vec<String>,

    /// Full-frame overlay graphics, drawn back to front.
    pub overlays: Vec<String>,

    /// Caption file.
    pub captions: Option<String>,
}

/// Background sequence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideshowSettings {
    /// Stretch the image sequence over the whole audio duration.
    pub auto_stretch: bool,

    /// Per-image duration when `auto_stretch` is off.
    pub fixed_segment_secs: f64,

    /// Pan/zoom strength multiplier (0 disables motion).
    pub zoom_intensity: f64,

    /// Crossfade window at the end of each segment.
    pub transition_secs: f64,
}

/// Caption appearance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    /// Font size in points at a 450 px reference height.
    pub font_size: f32,

    /// Fill color as hex string.
    pub fill: String,

    /// Outline color as hex string.
    pub outline: String,

    /// Outline width at a 720 px reference height.
    pub outline_width: f32,

    /// Vertical center of the caption block as a fraction of frame height.
    pub vertical_anchor: f32,

    /// TrueType/OpenType font file. When unset, the configured or system
    /// fallback font is used.
    pub font_path: Option<String>,
}

/// Output raster dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl Default for SlideshowSettings {
    fn default() -> Self {
        Self {
            auto_stretch: true,
            fixed_segment_secs: 5.0,
            zoom_intensity: 1.0,
            transition_secs: 1.0,
        }
    }
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 29.0,
            fill: "#ffffff".to_string(),
            outline: "#000000".to_string(),
            outline_width: 2.0,
            vertical_anchor: 0.79,
            font_path: None,
        }
    }
}

impl CaptionStyle {
    pub fn fill_color(&self) -> Rgba8 {
        Rgba8::parse_or(&self.fill, Rgba8::WHITE)
    }

    pub fn outline_color(&self) -> Rgba8 {
        Rgba8::parse_or(&self.outline, Rgba8::BLACK)
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// The complete in-memory representation of a loaded project.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    /// Filesystem path to the project directory.
    pub root: PathBuf,

    /// Project metadata.
    pub project: Project,

    /// Parsed captions (empty when the project has none).
    pub captions: Vec<Caption>,
}

impl Project {
    /// Create a new project with defaults.
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            version: "1.0".to_string(),
            name: name.into(),
            id: project_id(now),
            created_at: now.to_rfc3339(),
            modified_at: now.to_rfc3339(),
            assets: Assets::default(),
            slideshow: SlideshowSettings::default(),
            caption_style: CaptionStyle::default(),
            effects: default_effect_slots(),
            canvas: CanvasSize::default(),
        }
    }

    /// Refresh the modification timestamp.
    pub fn touch(&mut self) {
        self.modified_at = chrono::Utc::now().to_rfc3339();
    }
}

impl LoadedProject {
    /// Load a project from a directory.
    ///
    /// A caption file that is referenced but unreadable is logged and
    /// treated as empty; the project still loads.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();
        let project_path = root.join(PROJECT_FILE);

        let project_json =
            std::fs::read_to_string(&project_path).map_err(|e| ProjectError::IoError {
                path: project_path.clone(),
                source: e,
            })?;

        let project: Project =
            serde_json::from_str(&project_json).map_err(|e| ProjectError::ParseError {
                path: project_path,
                source: e,
            })?;

        let captions = match &project.assets.captions {
            Some(rel) => load_captions(root.join(rel)).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Caption file unavailable, continuing without captions");
                Vec::new()
            }),
            None => Vec::new(),
        };

        tracing::debug!(
            root = %root.display(),
            images = project.assets.images.len(),
            overlays = project.assets.overlays.len(),
            captions = captions.len(),
            "Loaded project"
        );

        Ok(Self {
            root,
            project,
            captions,
        })
    }

    /// Save the project file to disk.
    pub fn save(&self) -> Result<(), ProjectError> {
        std::fs::create_dir_all(&self.root).map_err(|e| ProjectError::IoError {
            path: self.root.clone(),
            source: e,
        })?;

        let project_path = self.root.join(PROJECT_FILE);
        let project_json =
            serde_json::to_string_pretty(&self.project).map_err(|e| ProjectError::ParseError {
                path: project_path.clone(),
                source: e,
            })?;
        std::fs::write(&project_path, project_json).map_err(|e| ProjectError::IoError {
            path: project_path,
            source: e,
        })?;

        Ok(())
    }

    /// Create a new project on disk with the standard directory structure.
    pub fn create(root: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();

        if root.join(PROJECT_FILE).exists() {
            return Err(ProjectError::ValidationError {
                message: format!("{} already contains a project", root.display()),
            });
        }

        for subdir in &["audio", "images", "overlays", "captions", "exports"] {
            std::fs::create_dir_all(root.join(subdir)).map_err(|e| ProjectError::IoError {
                path: root.join(subdir),
                source: e,
            })?;
        }

        let loaded = Self {
            root,
            project: Project::new(name),
            captions: Vec::new(),
        };
        loaded.save()?;
        Ok(loaded)
    }

    /// Absolute path of a project-relative asset.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn audio_path(&self) -> Option<PathBuf> {
        self.project.assets.audio.as_deref().map(|p| self.resolve(p))
    }

    pub fn image_paths(&self) -> Vec<PathBuf> {
        self.project
            .assets
            .images
            .iter()
            .map(|p| self.resolve(p))
            .collect()
    }

    pub fn overlay_paths(&self) -> Vec<PathBuf> {
        self.project
            .assets
            .overlays
            .iter()
            .map(|p| self.resolve(p))
            .collect()
    }

    pub fn font_path(&self) -> Option<PathBuf> {
        self.project
            .caption_style
            .font_path
            .as_deref()
            .map(|p| self.resolve(p))
    }

    /// Whether the project has caption cues but names no font for them.
    pub fn captions_without_font(&self) -> bool {
        !self.captions.is_empty() && self.project.caption_style.font_path.is_none()
    }

    /// Validate that all referenced source files exist.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = vec![];
        let assets = &self.project.assets;

        let mut check = |rel: &str, label: &str| {
            if !self.resolve(rel).exists() {
                errors.push(format!("{label} missing: {rel}"));
            }
        };

        if let Some(audio) = &assets.audio {
            check(audio, "Audio");
        }
        for image in &assets.images {
            check(image, "Image");
        }
        for overlay in &assets.overlays {
            check(overlay, "Overlay");
        }
        if let Some(captions) = &assets.captions {
            check(captions, "Caption file");
        }
        if let Some(font) = &self.project.caption_style.font_path {
            check(font, "Caption font");
        }

        if assets.audio.is_none() {
            errors.push("No audio track configured".to_string());
        }

        errors
    }
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}

/// Identifier derived from the creation instant.
fn project_id(now: chrono::DateTime<chrono::Utc>) -> String {
    let nanos = now.timestamp_nanos_opt().unwrap_or_default() as u64;
    format!("rs-{:016x}", nanos ^ 0x9e37_79b9_7f4a_7c15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectKind;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("reelsmith_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_project_defaults() {
        let project = Project::new("Demo");
        assert_eq!(project.name, "Demo");
        assert!(project.slideshow.auto_stretch);
        assert!((project.slideshow.fixed_segment_secs - 5.0).abs() < 1e-9);
        assert!((project.caption_style.font_size - 29.0).abs() < 1e-6);
        assert!((project.caption_style.vertical_anchor - 0.79).abs() < 1e-6);
        assert_eq!(project.effects.len(), 3);
        assert_eq!(project.effects[0].kind, EffectKind::FilmGrain);
        assert_eq!(project.canvas, CanvasSize::default());
    }

    #[test]
    fn test_sparse_project_file_fills_defaults() {
        let json = r#"{
            "version": "1.0",
            "name": "Sparse",
            "id": "x",
            "created_at": "2024-01-01T00:00:00Z",
            "modified_at": "2024-01-01T00:00:00Z",
            "assets": { "images": ["images/a.png"] }
        }"#;
        let parsed: Project = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.assets.images, vec!["images/a.png".to_string()]);
        assert!(parsed.assets.audio.is_none());
        assert_eq!(parsed.effects.len(), 3);
        assert_eq!(parsed.caption_style.fill_color(), Rgba8::WHITE);
    }

    #[test]
    fn test_loaded_project_create_and_load() {
        let dir = scratch_dir("create_load");

        let created = LoadedProject::create(&dir, "Integration Test").unwrap();
        assert_eq!(created.project.name, "Integration Test");
        assert!(dir.join("images").is_dir());

        let loaded = LoadedProject::load(&dir).unwrap();
        assert_eq!(loaded.project.name, "Integration Test");
        assert!(loaded.captions.is_empty());

        assert!(LoadedProject::create(&dir, "Again").is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_reads_caption_file() {
        let dir = scratch_dir("captions");
        let mut created = LoadedProject::create(&dir, "Captions").unwrap();
        std::fs::write(
            dir.join("captions/lyrics.srt"),
            "1\n00:00:00,000 --> 00:00:02,000\nHello\n",
        )
        .unwrap();
        created.project.assets.captions = Some("captions/lyrics.srt".to_string());
        created.save().unwrap();

        let mut loaded = LoadedProject::load(&dir).unwrap();
        assert_eq!(loaded.captions.len(), 1);
        assert_eq!(loaded.captions[0].text, "Hello");
        assert!(loaded.captions_without_font());

        loaded.project.caption_style.font_path = Some("fonts/caption.ttf".to_string());
        assert!(!loaded.captions_without_font());
        assert_eq!(loaded.font_path(), Some(dir.join("fonts/caption.ttf")));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_sources_reports_missing() {
        let dir = scratch_dir("validate");

        let mut loaded = LoadedProject::create(&dir, "Validate Test").unwrap();
        loaded.project.assets.images.push("images/missing.png".to_string());

        let errors = loaded.validate_sources();
        assert!(errors.iter().any(|e| e.contains("Image missing")));
        assert!(errors.iter().any(|e| e.contains("No audio track")));

        std::fs::remove_dir_all(&dir).ok();
    }
}
