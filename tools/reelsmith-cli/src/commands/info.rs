//! Show project information.

use std::path::PathBuf;

use reelsmith_document::Document;

pub fn run(path: PathBuf, json: bool) -> anyhow::Result<()> {
    let doc = Document::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    let summary = doc.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Project: {}", path.display());
    println!("  Version: {}", summary.version);
    println!("  Frame duration: {}", summary.frame_duration);
    println!();

    println!("Resources:");
    for (kind, count) in &summary.resources {
        println!("  {kind}: {count}");
    }
    println!();

    println!("Timeline:");
    println!("  Spine items: {}", summary.spine_items);
    for item in doc.spine_items() {
        println!(
            "    {} '{}' at {} for {}",
            item.name,
            item.attr("name").unwrap_or(""),
            item.attr("offset").unwrap_or("0s"),
            item.attr("duration").unwrap_or("?")
        );
    }
    println!(
        "  Duration: {} ({:.2}s)",
        summary.duration, summary.duration_seconds
    );

    Ok(())
}
