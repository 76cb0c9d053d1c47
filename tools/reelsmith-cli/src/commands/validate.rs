//! Check a project for structural problems.

use std::path::PathBuf;

use reelsmith_document::Document;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let doc = Document::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    println!("  Version: {}", doc.version().unwrap_or("unknown"));
    println!("  Frame duration: {}", doc.frame_rate());
    println!("  Resources: {}", doc.resources().len());
    println!("  Spine items: {}", doc.spine_item_count());

    let issues = doc.validate();
    if issues.is_empty() {
        println!("\nProject is valid.");
        return Ok(());
    }

    println!("\nValidation issues:");
    for issue in &issues {
        println!("  - {issue}");
    }
    anyhow::bail!("{} issue(s) found", issues.len())
}
