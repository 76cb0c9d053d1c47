//! Append one clip to a project.

use std::path::PathBuf;
use std::sync::Arc;

use reelsmith_common::AppConfig;
use reelsmith_engine::{ClipContent, FfprobeProbe, TimelineBuilder};

pub struct ClipArgs {
    pub video: PathBuf,
    pub audio: Option<PathBuf>,
    pub text: Option<String>,
    pub duration: Option<f64>,
    pub slide: bool,
}

pub fn run(
    project: PathBuf,
    clip: ClipArgs,
    output: Option<PathBuf>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let doc = super::open_or_create(&project, config)?;
    let probe = Arc::new(FfprobeProbe::from_config(&config.probe));
    let mut builder = TimelineBuilder::new(doc, config, probe);

    let mut content = ClipContent::new(clip.video).with_slide(clip.slide);
    if let Some(audio) = clip.audio {
        content = content.with_audio(audio);
    }
    if let Some(text) = clip.text {
        content = content.with_text(text);
    }
    if let Some(seconds) = clip.duration {
        content = content.with_duration(seconds);
    }

    let item = builder
        .append_clip(&content)
        .map_err(|e| anyhow::anyhow!("Failed to append clip: {e}"))?;
    println!(
        "Appended '{}' at {} ({:.2}s)",
        item.name,
        item.offset,
        item.duration.seconds()
    );

    let total = builder.total_duration();
    let doc = builder.finalize();
    let output = output.unwrap_or(project);
    doc.save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write project: {e}"))?;

    println!(
        "Wrote {} (total {:.2}s)",
        output.display(),
        total.seconds()
    );
    Ok(())
}
