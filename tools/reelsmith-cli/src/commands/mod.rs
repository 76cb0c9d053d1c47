pub mod append;
pub mod build;
pub mod check;
pub mod info;
pub mod new;
pub mod validate;

use std::path::Path;

use reelsmith_common::AppConfig;
use reelsmith_document::Document;

/// Load `path` if it exists, otherwise start a blank project named after it.
pub fn open_or_create(path: &Path, config: &AppConfig) -> anyhow::Result<Document> {
    if path.exists() {
        return Document::load(path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"));
    }
    tracing::info!(path = %path.display(), "Project does not exist yet; starting empty");
    Document::blank(&project_name(path), &config.timeline)
        .map_err(|e| anyhow::anyhow!("Failed to create project: {e}"))
}

/// Project name derived from a file path.
pub fn project_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}
