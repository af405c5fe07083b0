pub mod captions;
pub mod check;
pub mod info;
pub mod init;
pub mod preview;
pub mod render;
pub mod snapshot;

use std::path::Path;

use anyhow::Context;

use reelsmith_audio::{DecodedTrack, PlaybackSource};
use reelsmith_common::config::AppConfig;
use reelsmith_project_model::LoadedProject;
use reelsmith_render_engine::Scene;

/// A project with its audio decoded and its scene assembled.
pub struct OpenedProject {
    pub project: LoadedProject,
    pub track: DecodedTrack,
    pub scene: Scene,
}

impl OpenedProject {
    pub fn open(path: &Path, config: &AppConfig) -> anyhow::Result<Self> {
        let project =
            LoadedProject::load(path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
        let audio = project
            .audio_path()
            .ok_or_else(|| anyhow::anyhow!("Project has no audio track; the timeline needs one"))?;
        let track = DecodedTrack::open(&audio)
            .with_context(|| format!("Failed to decode audio {}", audio.display()))?;
        let mut scene = Scene::from_project(&project, track.duration_secs());
        if project.captions_without_font() {
            scene = scene.with_fallback_font(config.render.resolve_caption_font());
            match &scene.font_path {
                Some(font) => tracing::info!(font = %font.display(), "Using fallback caption font"),
                None => tracing::warn!(
                    "Project has captions but no caption font, and no fallback font was found; captions will not be drawn"
                ),
            }
        }

        tracing::info!(
            project = %project.project.name,
            duration_secs = scene.duration_secs,
            images = scene.images.len(),
            captions = scene.captions.len(),
            "Project opened"
        );
        Ok(Self {
            project,
            track,
            scene,
        })
    }

    pub fn canvas(&self) -> (u32, u32) {
        let canvas = self.project.project.canvas;
        (canvas.width, canvas.height)
    }
}
