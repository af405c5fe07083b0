//! Export a project to video.

use std::path::PathBuf;

use tokio::time::Instant;

use reelsmith_audio::AudioRouter;
use reelsmith_common::config::AppConfig;
use reelsmith_common::TimelineClock;
use reelsmith_project_model::{ExportFormat, QualityPreset, RenderSettings};
use reelsmith_render_engine::{
    ExportOutcome, ExportProgress, ExportSession, FfmpegEncoder, FrameCompositor, Stage,
};

use super::OpenedProject;

pub struct RenderArgs {
    pub path: PathBuf,
    pub filename: Option<String>,
    pub fps: Option<u32>,
    pub quality: Option<String>,
    pub format: Option<String>,
    pub out_dir: Option<PathBuf>,
}

pub async fn run(config: &AppConfig, args: RenderArgs) -> anyhow::Result<()> {
    println!("Rendering project at: {}", args.path.display());
    let mut opened = OpenedProject::open(&args.path, config)?;

    let quality_name = args.quality.unwrap_or_else(|| config.render.quality.clone());
    let quality = QualityPreset::parse(&quality_name).ok_or_else(|| {
        anyhow::anyhow!("Unknown quality: {quality_name}. Use: ultra, high, medium, low")
    })?;
    let format_name = args.format.unwrap_or_else(|| config.render.format.clone());
    let format = ExportFormat::parse(&format_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown format: {format_name}. Use: mp4, webm"))?;

    let settings = RenderSettings {
        filename: args
            .filename
            .unwrap_or_else(|| opened.project.project.name.clone()),
        fps: args.fps.unwrap_or(config.render.fps),
        bitrate: quality.bitrate(),
        format,
    };
    if settings.fps == 0 {
        anyhow::bail!("fps must be positive");
    }

    let out_dir = args
        .out_dir
        .unwrap_or_else(|| opened.project.root.join(&config.render.output_dir));
    let (width, height) = opened.canvas();

    println!("  Output: {}/{}.*", out_dir.display(), settings.filename);
    println!("  Format: {:?} ({quality_name})", settings.format);
    println!("  Resolution: {width}x{height} @ {}fps", settings.fps);
    println!(
        "  Duration: {:.1}s ({} frames)",
        opened.scene.duration_secs,
        settings.total_frames(opened.scene.duration_secs)
    );

    let encoder = FfmpegEncoder::probe(config.encoder.ffmpeg_binary.clone()).await;
    if !encoder.is_available() {
        tracing::warn!(binary = %config.encoder.ffmpeg_binary, "No ffmpeg encoders found");
    }

    let progress_cb: Box<dyn Fn(ExportProgress) + Send> = Box::new(|p| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames, {:?})  ",
            p.percent, p.frames_encoded, p.total_frames, p.state,
        );
    });
    let mut session = ExportSession::new(encoder, config.encoder.clone()).with_progress(progress_cb);

    let cancel = session.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut compositor = FrameCompositor::new(width, height, config.effects.clone());
    let mut router = AudioRouter::default();
    let mut clock = TimelineClock::new(opened.scene.duration_secs, Instant::now());
    let mut stage = Stage::new(
        &mut compositor,
        &mut router,
        &mut opened.track,
        &mut clock,
        &opened.scene,
    );
    stage.attach_source();

    let outcome = session.run(&settings, &mut stage).await?;
    println!();

    match outcome {
        ExportOutcome::Completed(artifact) => {
            std::fs::create_dir_all(&out_dir)
                .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", out_dir.display()))?;
            let output_path = out_dir.join(&artifact.file_name);
            std::fs::write(&output_path, &artifact.bytes)
                .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", output_path.display()))?;
            println!(
                "Export complete: {} ({} / {}, {:.1} MB)",
                output_path.display(),
                artifact.codec.video_codec,
                artifact.codec.audio_codec,
                artifact.bytes.len() as f64 / 1_000_000.0
            );
            Ok(())
        }
        ExportOutcome::Cancelled => {
            println!("Export cancelled.");
            Ok(())
        }
        ExportOutcome::Failed(failure) => Err(anyhow::anyhow!("Export failed: {failure}")),
    }
}
