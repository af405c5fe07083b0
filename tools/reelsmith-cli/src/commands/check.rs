//! Check ffmpeg and the codec candidates it can produce.

use reelsmith_common::config::AppConfig;
use reelsmith_project_model::ExportFormat;
use reelsmith_render_engine::{negotiate_codec, CodecCandidate, FfmpegEncoder};

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Reelsmith System Check");
    println!("{}", "=".repeat(50));

    let binary = &config.encoder.ffmpeg_binary;
    let encoder = FfmpegEncoder::probe(binary.clone()).await;
    if encoder.is_available() {
        println!(
            "[OK] ffmpeg: {} ({} encoders)",
            binary,
            encoder.available_encoders().len()
        );
    } else {
        println!("[FAIL] ffmpeg: {binary} not found or reported no encoders");
    }

    let available = encoder.available_encoders();
    let mut usable = 0;
    for format in [ExportFormat::Mp4, ExportFormat::Webm] {
        println!();
        println!("{:?} candidates:", format);
        for candidate in CodecCandidate::for_format(format) {
            let ok = candidate.supported_by(available);
            usable += usize::from(ok);
            println!(
                "  [{}] {} + {}",
                if ok { "OK" } else { "--" },
                candidate.video_codec,
                candidate.audio_codec
            );
        }
        let chosen = negotiate_codec(format, |c| c.supported_by(available));
        println!(
            "  Negotiated: {} + {} (.{})",
            chosen.video_codec, chosen.audio_codec, chosen.extension
        );
    }

    println!();
    if usable > 0 {
        println!("Reelsmith is ready to render.");
    } else {
        println!("No codec candidate is available. Install ffmpeg with libx264 or libvpx.");
    }

    Ok(())
}
