//! Clip strategies: the structural shape of one appended clip.
//!
//! Given the identifiers the builder has ensured, a strategy produces typed
//! [`TimelineItem`]s. Strategies hold no state; everything they need comes in
//! through [`ClipRefs`].
//!
//! - **No audio:** a single visual item. Stills are a `video` element on the
//!   rate-undefined format; movies are an `asset-clip` on the sequence format.
//! - **Audio:** the separate audio file is anchored to the visual item on lane
//!   -1 at relative offset `0s` ([`StandardClipStrategy`]), or both are wrapped
//!   in a compound media placed with a `ref-clip` ([`CompoundClipStrategy`]).
//! - **Text:** a `title` anchored on lane 1 for the full clip duration, with a
//!   style id from [`overlay_style_id`].

use std::collections::HashSet;

use reelsmith_common::{FrameRate, RationalTime};
use reelsmith_document::{
    AdjustTransform, ItemKind, Keyframe, Param, ResourceId, TextStyle, TimelineItem, TitleBody,
};
use sha2::{Digest, Sha256};

/// Slide animation length, in seconds.
const SLIDE_SECONDS: f64 = 2.0;

/// Horizontal end position of the slide animation.
const SLIDE_END_POSITION: &str = "67.9349 0";

/// Title overlay inputs.
#[derive(Debug, Clone)]
pub struct TitleRefs {
    pub effect: ResourceId,
    pub text: String,
    pub style: TextStyle,
}

/// Identifiers and timing for one clip.
#[derive(Debug, Clone)]
pub struct ClipRefs {
    pub name: String,
    pub rate: FrameRate,
    pub visual: ResourceId,
    /// Sequence format for movies, rate-undefined format for stills.
    pub visual_format: ResourceId,
    pub is_still: bool,
    pub audio: Option<ResourceId>,
    pub audio_duration: Option<RationalTime>,
    /// Compound media staged for this clip, if the strategy asked for one.
    pub compound: Option<ResourceId>,
    pub title: Option<TitleRefs>,
    pub offset: RationalTime,
    pub duration: RationalTime,
    /// Absolute position of this clip among the sequence's top-level items.
    pub sibling_index: usize,
    pub slide: bool,
}

/// Chooses the structure of an appended clip.
pub trait ClipStrategy: Send + Sync {
    /// Whether a compound media resource must be staged for this clip.
    fn needs_compound_wrapper(&self, has_audio: bool, is_still: bool) -> bool;

    /// Nested timeline of the compound wrapper, starting at `0s`.
    fn compound_items(&self, refs: &ClipRefs) -> Vec<TimelineItem>;

    /// The top-level item for the spine.
    ///
    /// `taken_styles` holds text style ids already present in the document.
    fn build_item(&self, refs: &ClipRefs, taken_styles: &HashSet<String>) -> TimelineItem;
}

/// Nested audio lane under the visual item.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardClipStrategy;

impl ClipStrategy for StandardClipStrategy {
    fn needs_compound_wrapper(&self, _has_audio: bool, _is_still: bool) -> bool {
        false
    }

    fn compound_items(&self, _refs: &ClipRefs) -> Vec<TimelineItem> {
        Vec::new()
    }

    fn build_item(&self, refs: &ClipRefs, taken_styles: &HashSet<String>) -> TimelineItem {
        let mut item = visual_item(refs, refs.offset);
        if let Some(audio) = audio_child(refs) {
            item.children.push(audio);
        }
        if let Some(title) = title_child(refs, taken_styles) {
            item.children.push(title);
        }
        if refs.slide {
            item.transform = Some(slide_transform(refs));
        }
        item
    }
}

/// Audio and visual wrapped together in a compound media.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompoundClipStrategy;

impl ClipStrategy for CompoundClipStrategy {
    fn needs_compound_wrapper(&self, has_audio: bool, _is_still: bool) -> bool {
        has_audio
    }

    fn compound_items(&self, refs: &ClipRefs) -> Vec<TimelineItem> {
        let mut inner = visual_item(refs, RationalTime::zero(refs.rate));
        if let Some(audio) = audio_child(refs) {
            inner.children.push(audio);
        }
        vec![inner]
    }

    fn build_item(&self, refs: &ClipRefs, taken_styles: &HashSet<String>) -> TimelineItem {
        let Some(compound) = &refs.compound else {
            return StandardClipStrategy.build_item(refs, taken_styles);
        };

        let mut item = TimelineItem {
            kind: ItemKind::RefClip,
            reference: compound.clone(),
            name: refs.name.clone(),
            lane: None,
            offset: refs.offset,
            start: None,
            duration: refs.duration,
            transform: None,
            children: Vec::new(),
        };
        if let Some(title) = title_child(refs, taken_styles) {
            item.children.push(title);
        }
        if refs.slide {
            item.transform = Some(slide_transform(refs));
        }
        item
    }
}

/// Style id for a title overlay: `ts` + 12 hex digits of SHA-256 over the
/// text, the clip name and the clip's sibling position.
pub fn overlay_style_id(text: &str, clip_name: &str, sibling_index: usize) -> String {
    salted_style_id(text, clip_name, sibling_index, 0)
}

fn salted_style_id(text: &str, clip_name: &str, sibling_index: usize, salt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update([0u8]);
    hasher.update(clip_name.as_bytes());
    hasher.update([0u8]);
    hasher.update((sibling_index as u64).to_be_bytes());
    if salt > 0 {
        hasher.update(salt.to_be_bytes());
    }
    let digest = hasher.finalize();
    let hex: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
    format!("ts{hex}")
}

/// [`overlay_style_id`], re-salted until it misses every taken id.
fn unique_style_id(
    text: &str,
    clip_name: &str,
    sibling_index: usize,
    taken: &HashSet<String>,
) -> String {
    let mut salt = 0;
    loop {
        let id = salted_style_id(text, clip_name, sibling_index, salt);
        if !taken.contains(&id) {
            return id;
        }
        tracing::debug!(id = %id, "Text style id already taken; re-salting");
        salt += 1;
    }
}

fn visual_item(refs: &ClipRefs, offset: RationalTime) -> TimelineItem {
    let kind = if refs.is_still {
        ItemKind::Video
    } else {
        ItemKind::AssetClip {
            format: Some(refs.visual_format.clone()),
            audio_role: None,
        }
    };
    TimelineItem {
        kind,
        reference: refs.visual.clone(),
        name: refs.name.clone(),
        lane: None,
        offset,
        start: None,
        duration: refs.duration,
        transform: None,
        children: Vec::new(),
    }
}

fn audio_child(refs: &ClipRefs) -> Option<TimelineItem> {
    let audio = refs.audio.as_ref()?;
    let duration = match refs.audio_duration {
        Some(d) if d.frames() > 0 && d.frames() < refs.duration.frames() => d,
        _ => refs.duration,
    };
    Some(TimelineItem {
        kind: ItemKind::AssetClip {
            format: None,
            audio_role: Some("dialogue".to_string()),
        },
        reference: audio.clone(),
        name: format!("{} - Audio", refs.name),
        lane: Some(-1),
        offset: RationalTime::zero(refs.rate),
        start: None,
        duration,
        transform: None,
        children: Vec::new(),
    })
}

fn title_child(refs: &ClipRefs, taken_styles: &HashSet<String>) -> Option<TimelineItem> {
    let title = refs.title.as_ref()?;
    let style_id = unique_style_id(&title.text, &refs.name, refs.sibling_index, taken_styles);
    // Generators start at one hour of the nominal rate.
    let start = refs.rate.time(refs.rate.nominal_fps() * 3600);
    Some(TimelineItem {
        kind: ItemKind::Title(TitleBody {
            text: title.text.clone(),
            style_id,
            style: title.style.clone(),
        }),
        reference: title.effect.clone(),
        name: format!("{} - Text", refs.name),
        lane: Some(1),
        offset: RationalTime::zero(refs.rate),
        start: Some(start),
        duration: refs.duration,
        transform: None,
        children: Vec::new(),
    })
}

fn slide_transform(refs: &ClipRefs) -> AdjustTransform {
    let slide_frames = refs
        .rate
        .seconds_to_frames(SLIDE_SECONDS)
        .unwrap_or(0)
        .min(refs.duration.frames());
    AdjustTransform {
        params: vec![Param {
            name: "position".to_string(),
            keyframes: vec![
                Keyframe {
                    time: RationalTime::zero(refs.rate),
                    value: "0 0".to_string(),
                },
                Keyframe {
                    time: refs.rate.time(slide_frames),
                    value: SLIDE_END_POSITION.to_string(),
                },
            ],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NTSC: FrameRate = FrameRate::NTSC_23_976;

    fn refs() -> ClipRefs {
        ClipRefs {
            name: "clip".to_string(),
            rate: NTSC,
            visual: ResourceId::allocated(3),
            visual_format: ResourceId::allocated(1),
            is_still: false,
            audio: None,
            audio_duration: None,
            compound: None,
            title: None,
            offset: NTSC.time(240),
            duration: NTSC.time(96),
            sibling_index: 1,
            slide: false,
        }
    }

    fn title(text: &str) -> TitleRefs {
        TitleRefs {
            effect: ResourceId::allocated(2),
            text: text.to_string(),
            style: TextStyle {
                font: "Helvetica Neue".to_string(),
                font_size: 196,
                font_color: "1 1 1 1".to_string(),
                bold: true,
                alignment: "center".to_string(),
                line_spacing: -19,
            },
        }
    }

    #[test]
    fn test_plain_video_and_still() {
        let item = StandardClipStrategy.build_item(&refs(), &HashSet::new());
        assert!(matches!(item.kind, ItemKind::AssetClip { format: Some(_), .. }));
        assert!(item.children.is_empty());
        assert_eq!(item.offset, NTSC.time(240));

        let mut still = refs();
        still.is_still = true;
        let item = StandardClipStrategy.build_item(&still, &HashSet::new());
        assert_eq!(item.kind, ItemKind::Video);
    }

    #[test]
    fn test_audio_is_nested_on_negative_lane() {
        let mut r = refs();
        r.audio = Some(ResourceId::allocated(4));
        let item = StandardClipStrategy.build_item(&r, &HashSet::new());
        assert_eq!(item.children.len(), 1);
        let audio = &item.children[0];
        assert_eq!(audio.lane, Some(-1));
        assert!(audio.offset.is_zero());
        assert_eq!(audio.duration, item.duration);
        assert_eq!(audio.name, "clip - Audio");
    }

    #[test]
    fn test_short_audio_keeps_its_length() {
        let mut r = refs();
        r.audio = Some(ResourceId::allocated(4));
        r.audio_duration = Some(NTSC.time(50));
        let item = StandardClipStrategy.build_item(&r, &HashSet::new());
        assert_eq!(item.children[0].duration.frames(), 50);
    }

    #[test]
    fn test_title_overlay_shape() {
        let mut r = refs();
        r.title = Some(title("Hello"));
        let item = StandardClipStrategy.build_item(&r, &HashSet::new());
        let overlay = &item.children[0];
        assert_eq!(overlay.lane, Some(1));
        assert_eq!(overlay.duration, item.duration);
        assert_eq!(overlay.start.map(|s| s.to_string()).as_deref(), Some("86486400/24000s"));
        match &overlay.kind {
            ItemKind::Title(body) => {
                assert_eq!(body.text, "Hello");
                assert_eq!(body.style_id, overlay_style_id("Hello", "clip", 1));
            }
            other => panic!("expected title, got {other:?}"),
        }
    }

    #[test]
    fn test_style_id_shape_and_inputs() {
        let id = overlay_style_id("Hello", "clip", 0);
        assert_eq!(id.len(), 14);
        assert!(id.starts_with("ts"));
        assert!(id[2..].chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(id, overlay_style_id("Hello", "clip", 0));
        assert_ne!(id, overlay_style_id("Hello", "other", 0));
        assert_ne!(id, overlay_style_id("Hello", "clip", 1));
        assert_ne!(id, overlay_style_id("Hello!", "clip", 0));
        // Field boundaries matter.
        assert_ne!(overlay_style_id("ab", "c", 0), overlay_style_id("a", "bc", 0));
    }

    #[test]
    fn test_taken_style_id_is_resalted() {
        let mut r = refs();
        r.title = Some(title("Hello"));
        let taken: HashSet<String> = [overlay_style_id("Hello", "clip", 1)].into_iter().collect();
        let item = StandardClipStrategy.build_item(&r, &taken);
        match &item.children[0].kind {
            ItemKind::Title(body) => assert!(!taken.contains(&body.style_id)),
            other => panic!("expected title, got {other:?}"),
        }
    }

    #[test]
    fn test_compound_strategy_wraps_audio() {
        let mut r = refs();
        r.audio = Some(ResourceId::allocated(4));
        assert!(CompoundClipStrategy.needs_compound_wrapper(true, false));
        assert!(!CompoundClipStrategy.needs_compound_wrapper(false, false));

        let inner = CompoundClipStrategy.compound_items(&r);
        assert_eq!(inner.len(), 1);
        assert!(inner[0].offset.is_zero());
        assert_eq!(inner[0].children[0].lane, Some(-1));

        r.compound = Some(ResourceId::allocated(5));
        r.title = Some(title("Hi"));
        let item = CompoundClipStrategy.build_item(&r, &HashSet::new());
        assert_eq!(item.kind, ItemKind::RefClip);
        assert_eq!(item.reference, ResourceId::allocated(5));
        assert_eq!(item.children.len(), 1);
        assert_eq!(item.children[0].lane, Some(1));
    }

    #[test]
    fn test_slide_is_clamped_to_clip() {
        let mut r = refs();
        r.slide = true;
        r.duration = NTSC.time(24);
        let item = StandardClipStrategy.build_item(&r, &HashSet::new());
        let transform = item.transform.unwrap();
        let keyframes = &transform.params[0].keyframes;
        assert_eq!(keyframes[1].time.frames(), 24);
        assert_eq!(keyframes[1].value, "67.9349 0");
    }
}
