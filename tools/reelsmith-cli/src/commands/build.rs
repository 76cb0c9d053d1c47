//! Append every clip listed in a JSON manifest.
//!
//! Durations are probed in parallel up front; clips are then appended one by
//! one in manifest order so offsets stay deterministic.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelsmith_common::AppConfig;
use reelsmith_document::MediaKind;
use reelsmith_engine::{probe_batch, ClipContent, DurationProbe, FfprobeProbe, TimelineBuilder};
use serde::Deserialize;

/// One manifest entry. Relative paths are resolved against the manifest's directory.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestClip {
    video: PathBuf,
    #[serde(default)]
    audio: Option<PathBuf>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    slide: bool,
}

pub async fn run(
    manifest: PathBuf,
    output: PathBuf,
    project: Option<PathBuf>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&manifest)
        .map_err(|e| anyhow::anyhow!("Failed to read manifest {}: {e}", manifest.display()))?;
    let entries: Vec<ManifestClip> = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("Failed to parse manifest: {e}"))?;
    let base = manifest.parent().unwrap_or(Path::new("."));

    let mut clips: Vec<ClipContent> = entries
        .into_iter()
        .map(|entry| to_content(entry, base))
        .collect();
    println!("Building {} clip(s) from {}", clips.len(), manifest.display());

    let probe: Arc<dyn DurationProbe> = Arc::new(FfprobeProbe::from_config(&config.probe));
    let (visual_paths, audio_paths) = probe_targets(&clips);
    let visual_results = probe_batch(
        Arc::clone(&probe),
        visual_paths.iter().map(|(_, p)| p.clone()).collect(),
        config.probe.parallelism,
    )
    .await;
    let audio_results = probe_batch(
        Arc::clone(&probe),
        audio_paths.iter().map(|(_, p)| p.clone()).collect(),
        config.probe.parallelism,
    )
    .await;
    for ((index, _), result) in visual_paths.iter().zip(visual_results) {
        clips[*index].visual_seconds = result.ok();
    }
    for ((index, _), result) in audio_paths.iter().zip(audio_results) {
        clips[*index].audio_seconds = result.ok();
    }

    let doc = match &project {
        Some(path) => super::open_or_create(path, config)?,
        None => super::open_or_create(&output, config)?,
    };
    let mut builder = TimelineBuilder::new(doc, config, probe);

    let mut skipped = 0usize;
    for (index, clip) in clips.iter().enumerate() {
        match builder.append_clip(clip) {
            Ok(item) => println!(
                "  [{index}] {} at {} ({:.2}s)",
                item.name,
                item.offset,
                item.duration.seconds()
            ),
            Err(e) => {
                skipped += 1;
                tracing::error!(index, visual = %clip.visual.display(), "Skipping clip: {e}");
                println!("  [{index}] skipped: {e}");
            }
        }
    }

    let total = builder.total_duration();
    let doc = builder.finalize();
    doc.save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write project: {e}"))?;

    println!();
    println!(
        "Wrote {} ({} clip(s), {} skipped, total {:.2}s)",
        output.display(),
        clips.len() - skipped,
        skipped,
        total.seconds()
    );
    if skipped == clips.len() && !clips.is_empty() {
        anyhow::bail!("No clips could be appended");
    }
    Ok(())
}

fn to_content(entry: ManifestClip, base: &Path) -> ClipContent {
    let mut content = ClipContent::new(base.join(entry.video)).with_slide(entry.slide);
    if let Some(audio) = entry.audio {
        content = content.with_audio(base.join(audio));
    }
    if let Some(text) = entry.text {
        content = content.with_text(text);
    }
    if let Some(seconds) = entry.duration {
        content = content.with_duration(seconds);
    }
    content
}

/// Files worth probing, tagged with their clip index.
fn probe_targets(clips: &[ClipContent]) -> (Vec<(usize, PathBuf)>, Vec<(usize, PathBuf)>) {
    let mut visual = Vec::new();
    let mut audio = Vec::new();
    for (index, clip) in clips.iter().enumerate() {
        if MediaKind::from_path(&clip.visual) != MediaKind::Image && clip.visual.exists() {
            visual.push((index, clip.visual.clone()));
        }
        if let Some(path) = clip.audio.as_ref().filter(|p| p.exists()) {
            audio.push((index, path.clone()));
        }
    }
    (visual, audio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_paths_resolve_against_manifest_dir() {
        let entries: Vec<ManifestClip> = serde_json::from_str(
            r#"[
                {"video": "a.mov", "audio": "/abs/a.wav", "text": "Hi", "duration": 2.5},
                {"video": "card.png", "slide": true}
            ]"#,
        )
        .unwrap();
        let clips: Vec<_> = entries
            .into_iter()
            .map(|e| to_content(e, Path::new("/work")))
            .collect();

        assert_eq!(clips[0].visual, PathBuf::from("/work/a.mov"));
        assert_eq!(clips[0].audio, Some(PathBuf::from("/abs/a.wav")));
        assert_eq!(clips[0].text.as_deref(), Some("Hi"));
        assert!(clips[1].slide);
        assert!(clips[1].audio.is_none());
    }

    #[test]
    fn test_unknown_manifest_fields_are_rejected() {
        let parsed: Result<Vec<ManifestClip>, _> =
            serde_json::from_str(r#"[{"video": "a.mov", "volume": 3}]"#);
        assert!(parsed.is_err());
    }
}
