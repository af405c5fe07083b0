//! List caption cues.

use std::path::PathBuf;

use reelsmith_processing_core::typewriter::reveal_count;
use reelsmith_project_model::{active_caption, load_captions};

pub fn run(file: PathBuf, at: Option<f64>) -> anyhow::Result<()> {
    let captions =
        load_captions(&file).map_err(|e| anyhow::anyhow!("Failed to read captions: {e}"))?;

    println!("{}: {} cue(s)", file.display(), captions.len());
    for cue in &captions {
        println!(
            "  #{:<4} {:>8.3}s -> {:>8.3}s  {}",
            cue.id,
            cue.start_secs,
            cue.end_secs,
            cue.text.replace('\n', " / ")
        );
    }

    if let Some(at) = at {
        println!();
        match active_caption(&captions, at) {
            Some(cue) => {
                let len = cue.text.chars().count();
                let shown = reveal_count(len, at - cue.start_secs, cue.duration_secs());
                let visible: String = cue.text.chars().take(shown).collect();
                println!("At {at:.3}s: cue #{} ({shown}/{len} characters revealed)", cue.id);
                for line in visible.lines() {
                    println!("  | {line}");
                }
            }
            None => println!("At {at:.3}s: no caption"),
        }
    }

    Ok(())
}
