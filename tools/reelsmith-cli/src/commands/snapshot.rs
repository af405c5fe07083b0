//! Render one frame of a project.

use std::path::PathBuf;

use reelsmith_common::config::AppConfig;
use reelsmith_render_engine::{FrameCompositor, RenderMode};

use super::OpenedProject;

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    at: f64,
    output: PathBuf,
    export_look: bool,
) -> anyhow::Result<()> {
    let opened = OpenedProject::open(&path, config)?;
    let (width, height) = opened.canvas();
    let mode = if export_look {
        RenderMode::Export
    } else {
        RenderMode::Preview
    };

    let mut compositor = FrameCompositor::new(width, height, config.effects.clone());
    compositor.preload(&opened.scene).await;

    let at = at.clamp(0.0, opened.scene.duration_secs);
    let frame = compositor.render(at, &opened.scene, mode);
    frame
        .save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", output.display()))?;

    println!(
        "Frame at {:.3}s ({:?}, {}x{}) written to {}",
        at,
        mode,
        width,
        height,
        output.display()
    );
    Ok(())
}
