//! Initialize a new Reelsmith project.

use std::path::PathBuf;

use reelsmith_project_model::LoadedProject;

pub fn run(path: PathBuf, name: Option<String>) -> anyhow::Result<()> {
    let name = name
        .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "slideshow".to_string());
    println!("Creating project '{}' at {}", name, path.display());

    let project = LoadedProject::create(&path, &name)
        .map_err(|e| anyhow::anyhow!("Failed to create project: {e}"))?;
    let canvas = project.project.canvas;

    println!("Project created successfully:");
    println!("  Directory: {}", project.root.display());
    println!("  Canvas: {}x{}", canvas.width, canvas.height);
    println!();
    println!("Directory structure:");
    println!("  {}/", name);
    println!("  ├── project.json");
    println!("  ├── audio/       (the soundtrack)");
    println!("  ├── images/      (background sequence)");
    println!("  ├── overlays/    (full-frame graphics)");
    println!("  ├── captions/    (caption file)");
    println!("  └── exports/     (rendered output)");
    println!();
    println!("Add assets to project.json, then run `reelsmith info {}`.", path.display());

    Ok(())
}
