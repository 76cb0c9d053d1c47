//! Timeline builder: appends clips to a document's primary storyline.
//!
//! The builder keeps a running ledger of the items placed in this session.
//! The duration already on the spine of a loaded document is summed once at
//! construction; after that the next offset is always
//! `existing + sum(ledger durations)`, computed on frame counts.
//!
//! Each append runs in its own [`ResourceTransaction`]. A failed append
//! leaves neither resources nor a ledger entry behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelsmith_common::{
    AppConfig, ForgeError, ForgeResult, FrameRate, RationalTime, TimelineDefaults, TitleDefaults,
};
use reelsmith_document::{
    CompoundMedia, Document, Effect, Format, ItemKind, MediaAsset, MediaKind, ResourceId,
    TextStyle, TimelineItem,
};

use crate::probe::DurationProbe;
use crate::registry::ResourceRegistry;
use crate::strategy::{
    ClipRefs, ClipStrategy, CompoundClipStrategy, StandardClipStrategy, TitleRefs,
};
use crate::transaction::ResourceTransaction;

/// Name of the format given to still images.
pub const STILL_FORMAT_NAME: &str = "FFVideoFormatRateUndefined";

const STILL_COLOR_SPACE: &str = "1-13-1";

/// How long an appended clip should be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipDuration {
    /// Exactly this many seconds, snapped to the nearest frame.
    Explicit(f64),
    /// Audio length if audio is given, else the video length, else the
    /// still-image default.
    FromMedia,
}

/// One clip to append.
#[derive(Debug, Clone)]
pub struct ClipContent {
    pub visual: PathBuf,
    pub audio: Option<PathBuf>,
    pub text: Option<String>,
    pub duration: ClipDuration,
    /// Already-probed visual duration in seconds.
    pub visual_seconds: Option<f64>,
    /// Already-probed audio duration in seconds.
    pub audio_seconds: Option<f64>,
    /// Animate position over the first two seconds.
    pub slide: bool,
}

impl ClipContent {
    pub fn new(visual: impl Into<PathBuf>) -> Self {
        Self {
            visual: visual.into(),
            audio: None,
            text: None,
            duration: ClipDuration::FromMedia,
            visual_seconds: None,
            audio_seconds: None,
            slide: false,
        }
    }

    pub fn with_audio(mut self, audio: impl Into<PathBuf>) -> Self {
        self.audio = Some(audio.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = ClipDuration::Explicit(seconds);
        self
    }

    pub fn with_slide(mut self, slide: bool) -> Self {
        self.slide = slide;
        self
    }
}

/// Appends clips to a document and tracks their placement.
pub struct TimelineBuilder {
    registry: ResourceRegistry,
    strategy: Box<dyn ClipStrategy>,
    probe: Arc<dyn DurationProbe>,
    timeline: TimelineDefaults,
    title: TitleDefaults,
    rate: FrameRate,
    /// Spine duration present when the document was handed over.
    existing_frames: u64,
    existing_items: usize,
    /// Sum of ledger durations.
    placed_frames: u64,
    ledger: Vec<TimelineItem>,
    style_ids: HashSet<String>,
}

impl TimelineBuilder {
    pub fn new(document: Document, config: &AppConfig, probe: Arc<dyn DurationProbe>) -> Self {
        let rate = document.frame_rate();
        let existing_frames = document.existing_spine_frames();
        let existing_items = document.spine_item_count();
        let style_ids = document.text_style_ids();
        if existing_items > 0 {
            tracing::info!(
                items = existing_items,
                duration = %rate.time(existing_frames),
                "Appending after existing timeline content"
            );
        }

        let strategy: Box<dyn ClipStrategy> = if config.timeline.compound_audio {
            Box::new(CompoundClipStrategy)
        } else {
            Box::new(StandardClipStrategy)
        };

        Self {
            registry: ResourceRegistry::new(document),
            strategy,
            probe,
            timeline: config.timeline.clone(),
            title: config.title.clone(),
            rate,
            existing_frames,
            existing_items,
            placed_frames: 0,
            ledger: Vec::new(),
            style_ids,
        }
    }

    /// Replace the clip strategy.
    pub fn with_strategy(mut self, strategy: Box<dyn ClipStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.rate
    }

    /// Items placed in this session, in order.
    pub fn ledger(&self) -> &[TimelineItem] {
        &self.ledger
    }

    /// End of the spine, including content that was already there.
    pub fn total_duration(&self) -> RationalTime {
        self.rate.time(self.existing_frames + self.placed_frames)
    }

    /// Append one clip at the end of the spine.
    pub fn append_clip(&mut self, content: &ClipContent) -> ForgeResult<&TimelineItem> {
        let visual = resolve_source(&content.visual)?;
        let audio = content.audio.as_deref().map(resolve_source).transpose()?;
        let visual_kind = MediaKind::from_path(&visual);
        let is_still = visual_kind == MediaKind::Image;
        let name = clip_name(&visual);

        let visual_known = self.registry.find_existing_asset_by_path(&visual).is_some();
        let audio_known = audio
            .as_deref()
            .map_or(false, |p| self.registry.find_existing_asset_by_path(p).is_some());
        let from_media = content.duration == ClipDuration::FromMedia;

        let visual_seconds = if !is_still && (!visual_known || (from_media && audio.is_none())) {
            self.media_seconds(&visual, content.visual_seconds)
        } else {
            None
        };
        let audio_seconds = match &audio {
            Some(path) if !audio_known || from_media => self.media_seconds(path, content.audio_seconds),
            _ => None,
        };

        let seconds = match content.duration {
            ClipDuration::Explicit(seconds) => seconds,
            ClipDuration::FromMedia => match (&audio, is_still) {
                (Some(_), _) => audio_seconds.unwrap_or(self.timeline.still_duration_secs),
                (None, true) => self.timeline.still_duration_secs,
                (None, false) => visual_seconds.unwrap_or(self.timeline.still_duration_secs),
            },
        };
        let duration = self.rate.seconds_to_rational(seconds)?;
        if duration.is_zero() {
            return Err(ForgeError::invalid_time(
                seconds.to_string(),
                "clip duration must be at least one frame",
            ));
        }
        let offset = self.total_duration();

        let sequence_format = self
            .registry
            .document()
            .sequence_format()
            .ok_or_else(|| ForgeError::transaction("sequence has no format"))?;

        let rate = self.rate;
        let mut tx = ResourceTransaction::begin(&mut self.registry);
        let still_format = ensure_still_format(&mut tx, &self.timeline)?;
        let effect = ensure_title_effect(&mut tx, &self.title)?;

        let visual_format = if is_still {
            still_format
        } else {
            sequence_format.clone()
        };
        let visual_id = match tx.find_asset_by_path(&visual) {
            Some(existing) => existing.id().clone(),
            None => {
                let asset_duration = if is_still {
                    RationalTime::zero(rate)
                } else {
                    visual_seconds
                        .and_then(|s| rate.seconds_to_rational(s).ok())
                        .unwrap_or(duration)
                };
                let id = reserve_one(&mut tx)?;
                tx.stage_asset(MediaAsset {
                    id,
                    name: name.clone(),
                    uid: ResourceRegistry::content_uid_for_path(&visual),
                    source: visual.clone(),
                    kind: visual_kind,
                    duration: asset_duration,
                    format: Some(visual_format.clone()),
                })?
            }
        };

        // A reused asset keeps the length it was registered with.
        let probed_audio = audio_seconds.and_then(|s| rate.seconds_to_rational(s).ok());
        let (audio_id, audio_duration) = match &audio {
            None => (None, None),
            Some(path) => match tx.find_asset_by_path(path) {
                Some(existing) => (
                    Some(existing.id().clone()),
                    existing
                        .duration_frames(rate)
                        .map(|frames| rate.time(frames))
                        .or(probed_audio),
                ),
                None => {
                    let kind = MediaKind::from_path(path);
                    if kind == MediaKind::Image {
                        return Err(ForgeError::transaction(format!(
                            "{} is a still image and cannot be used as audio",
                            path.display()
                        )));
                    }
                    let id = reserve_one(&mut tx)?;
                    let id = tx.stage_asset(MediaAsset {
                        id,
                        name: clip_name(path),
                        uid: ResourceRegistry::content_uid_for_path(path),
                        source: path.clone(),
                        kind,
                        duration: probed_audio.unwrap_or(duration),
                        format: (kind == MediaKind::Video).then(|| sequence_format.clone()),
                    })?;
                    (Some(id), probed_audio)
                }
            },
        };

        let mut refs = ClipRefs {
            name: name.clone(),
            rate,
            visual: visual_id,
            visual_format,
            is_still,
            audio: audio_id,
            audio_duration,
            compound: None,
            title: content.text.as_ref().map(|text| TitleRefs {
                effect: effect.clone(),
                text: text.clone(),
                style: text_style(&self.title),
            }),
            offset,
            duration,
            sibling_index: self.existing_items + self.ledger.len(),
            slide: content.slide,
        };

        if self
            .strategy
            .needs_compound_wrapper(refs.audio.is_some(), is_still)
        {
            let items = self.strategy.compound_items(&refs);
            let audio_name = audio
                .as_deref()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let wrapper_name = format!("{name} Clip");
            let uid =
                ResourceRegistry::compute_content_uid(&format!("{wrapper_name}\0{audio_name}"));
            let existing = tx.registry().find_compound(&uid, duration, &items).cloned();
            let id = match existing {
                Some(id) => {
                    tracing::debug!(id = %id, name = %wrapper_name, "Reusing compound clip");
                    id
                }
                None => {
                    let id = reserve_one(&mut tx)?;
                    tx.stage_compound(CompoundMedia {
                        id,
                        uid,
                        name: wrapper_name,
                        format: sequence_format,
                        duration,
                        items,
                    })?
                }
            };
            refs.compound = Some(id);
        }

        tx.commit()?;

        let item = self.strategy.build_item(&refs, &self.style_ids);
        collect_style_ids(&item, &mut self.style_ids);

        tracing::info!(
            name = %name,
            offset = %item.offset,
            duration = %item.duration,
            "Appended clip"
        );

        self.placed_frames += item.duration.frames();
        self.ledger.push(item);
        let total = self.total_duration();
        self.registry.document_mut().set_sequence_duration(total);

        Ok(&self.ledger[self.ledger.len() - 1])
    }

    /// Write the ledger onto the spine and hand back the document.
    pub fn finalize(mut self) -> Document {
        let total = self.total_duration();
        let document = self.registry.document_mut();
        for item in &self.ledger {
            document.append_to_spine(item);
        }
        document.set_sequence_duration(total);
        tracing::debug!(
            appended = self.ledger.len(),
            duration = %total,
            "Finalized timeline"
        );
        self.registry.into_document()
    }

    /// Pre-probed value if usable, else probe; `None` when probing fails.
    fn media_seconds(&self, path: &Path, hint: Option<f64>) -> Option<f64> {
        if let Some(seconds) = hint.filter(|s| s.is_finite() && *s > 0.0) {
            return Some(seconds);
        }
        match self.probe.probe_duration(path) {
            Ok(seconds) => Some(seconds),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    "Duration probe failed, using default of {}s: {e}",
                    self.timeline.still_duration_secs
                );
                None
            }
        }
    }
}

fn resolve_source(path: &Path) -> ForgeResult<PathBuf> {
    if !path.exists() {
        return Err(ForgeError::input_not_found(path));
    }
    Ok(std::fs::canonicalize(path)?)
}

fn clip_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string())
}

fn reserve_one(tx: &mut ResourceTransaction<'_>) -> ForgeResult<ResourceId> {
    tx.reserve_identifiers(1)?
        .into_iter()
        .next()
        .ok_or(ForgeError::IdentifierExhausted)
}

fn ensure_still_format(
    tx: &mut ResourceTransaction<'_>,
    timeline: &TimelineDefaults,
) -> ForgeResult<ResourceId> {
    if let Some(id) = tx.registry().find_format_by_name(STILL_FORMAT_NAME) {
        return Ok(id.clone());
    }
    let id = reserve_one(tx)?;
    tx.stage_format(Format {
        id,
        name: STILL_FORMAT_NAME.to_string(),
        frame_rate: None,
        width: timeline.width,
        height: timeline.height,
        color_space: STILL_COLOR_SPACE.to_string(),
    })
}

fn ensure_title_effect(
    tx: &mut ResourceTransaction<'_>,
    title: &TitleDefaults,
) -> ForgeResult<ResourceId> {
    if let Some(id) = tx.registry().find_effect_by_name(&title.effect_name) {
        return Ok(id.clone());
    }
    let id = reserve_one(tx)?;
    tx.stage_effect(Effect {
        id,
        name: title.effect_name.clone(),
        uid: title.effect_uid.clone(),
    })
}

fn text_style(title: &TitleDefaults) -> TextStyle {
    TextStyle {
        font: title.font.clone(),
        font_size: title.font_size,
        font_color: title.font_color.clone(),
        bold: true,
        alignment: "center".to_string(),
        line_spacing: -19,
    }
}

fn collect_style_ids(item: &TimelineItem, ids: &mut HashSet<String>) {
    if let ItemKind::Title(body) = &item.kind {
        ids.insert(body.style_id.clone());
    }
    for child in &item.children {
        collect_style_ids(child, ids);
    }
}
