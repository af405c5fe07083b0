//! Headless real-time preview.
//!
//! Plays the project against the wall clock exactly as an interactive
//! preview would, but writes frames to disk instead of a window.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use reelsmith_audio::AudioRouter;
use reelsmith_common::config::AppConfig;
use reelsmith_common::TimelineClock;
use reelsmith_render_engine::{FrameCompositor, PreviewPlayer, Stage};

use super::OpenedProject;

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    seconds: f64,
    every: u32,
    out_dir: PathBuf,
) -> anyhow::Result<()> {
    let mut opened = OpenedProject::open(&path, config)?;
    let (width, height) = opened.canvas();
    std::fs::create_dir_all(&out_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", out_dir.display()))?;

    let mut compositor = FrameCompositor::new(width, height, config.effects.clone());
    compositor.preload(&opened.scene).await;
    let mut router = AudioRouter::default();
    let mut clock = TimelineClock::new(opened.scene.duration_secs, Instant::now());

    let stage = Stage::new(
        &mut compositor,
        &mut router,
        &mut opened.track,
        &mut clock,
        &opened.scene,
    );
    let mut player = PreviewPlayer::new(stage, &config.preview);

    let frame_hz = config.preview.frame_hz.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(frame_hz)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let every = every.max(1);
    let started = Instant::now();
    player.play(started).await?;
    println!(
        "Previewing {:.1}s at {} Hz, saving every {} frame(s) to {}",
        seconds,
        frame_hz,
        every,
        out_dir.display()
    );

    let mut drawn = 0u32;
    let mut saved = 0u32;
    loop {
        ticker.tick().await;
        let now = Instant::now();
        let frame = player.frame(now);
        if drawn % every == 0 {
            let file = out_dir.join(format!("frame_{saved:05}.png"));
            frame
                .save(&file)
                .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", file.display()))?;
            saved += 1;
        }
        drawn += 1;

        if player.is_finished() || now.duration_since(started).as_secs_f64() >= seconds {
            break;
        }
    }
    player.pause(Instant::now());

    println!(
        "Drew {drawn} frame(s), saved {saved}, stopped at {:.3}s",
        player.position()
    );
    Ok(())
}
