//! Show project information.

use std::path::PathBuf;

use reelsmith_audio::{DecodedTrack, PlaybackSource};
use reelsmith_common::config::AppConfig;
use reelsmith_project_model::LoadedProject;

pub fn run(config: &AppConfig, path: PathBuf) -> anyhow::Result<()> {
    let project =
        LoadedProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let p = &project.project;

    println!("Project: {}", p.name);
    println!("  ID: {}", p.id);
    println!("  Created: {}", p.created_at);
    println!("  Modified: {}", p.modified_at);
    println!("  Canvas: {}x{}", p.canvas.width, p.canvas.height);
    println!();

    println!("Assets:");
    match project.audio_path() {
        Some(audio) => match DecodedTrack::open(&audio) {
            Ok(track) => {
                let format = track.format();
                println!(
                    "  Audio: {} ({:.1}s, {} Hz, {} ch)",
                    audio.display(),
                    track.duration_secs(),
                    format.sample_rate,
                    format.channels
                );
            }
            Err(e) => println!("  Audio: {} (unreadable: {e})", audio.display()),
        },
        None => println!("  Audio: none"),
    }
    println!("  Images: {}", p.assets.images.len());
    println!("  Overlays: {}", p.assets.overlays.len());
    println!("  Captions: {} cue(s)", project.captions.len());
    let fallback_font = if project.captions_without_font() {
        config.render.resolve_caption_font()
    } else {
        None
    };
    match (project.font_path(), &fallback_font) {
        (Some(font), _) => println!("  Caption font: {}", font.display()),
        (None, Some(font)) => println!("  Caption font: {} (fallback)", font.display()),
        (None, None) => println!("  Caption font: none"),
    }
    println!();

    println!("Slideshow:");
    println!(
        "  {} (transition {:.1}s, zoom x{})",
        if p.slideshow.auto_stretch {
            "Stretched over the audio".to_string()
        } else {
            format!("{:.1}s per image", p.slideshow.fixed_segment_secs)
        },
        p.slideshow.transition_secs,
        p.slideshow.zoom_intensity
    );
    println!();

    println!("Effects:");
    for (i, slot) in p.effects.iter().enumerate() {
        if slot.is_identity() {
            println!("  {}. -", i + 1);
        } else {
            println!("  {}. {} ({:.0}%)", i + 1, slot.kind.as_str(), slot.strength * 100.0);
        }
    }

    let mut issues = project.validate_sources();
    if project.captions_without_font() && fallback_font.is_none() {
        issues.push(
            "Captions have no font and no fallback font was found; set caption_style.font_path or render.caption_font".to_string(),
        );
    }
    if !issues.is_empty() {
        println!();
        println!("Issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
    }

    Ok(())
}
