//! Write a new empty project.

use std::path::PathBuf;

use reelsmith_common::AppConfig;
use reelsmith_document::Document;

pub fn run(output: PathBuf, name: Option<String>, config: &AppConfig) -> anyhow::Result<()> {
    let name = name.unwrap_or_else(|| super::project_name(&output));
    println!("Creating project '{}' at {}", name, output.display());

    let doc = Document::blank(&name, &config.timeline)
        .map_err(|e| anyhow::anyhow!("Failed to create project: {e}"))?;
    doc.save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write project: {e}"))?;

    println!("Project created successfully:");
    println!("  Format: {}", config.timeline.format_name);
    println!(
        "  Resolution: {}x{} @ {}",
        config.timeline.width,
        config.timeline.height,
        doc.frame_rate()
    );

    Ok(())
}
