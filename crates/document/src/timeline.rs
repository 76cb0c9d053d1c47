//! Typed timeline items and their structural serializer.

use reelsmith_common::RationalTime;

use crate::resource::ResourceId;
use crate::xml::Element;

/// Shape of a placed item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    /// `asset-clip`: a media asset placed directly.
    AssetClip {
        format: Option<ResourceId>,
        audio_role: Option<String>,
    },
    /// `video`: a visual asset without its own audio.
    Video,
    /// `ref-clip`: a compound media reference.
    RefClip,
    /// `title`: a text overlay generated from an effect.
    Title(TitleBody),
}

/// Text and style of a title overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleBody {
    pub text: String,
    /// Document-unique `text-style-def` id.
    pub style_id: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: String,
    pub font_size: u32,
    pub font_color: String,
    pub bold: bool,
    pub alignment: String,
    pub line_spacing: i32,
}

/// Keyframed parameter of an `adjust-transform`.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub keyframes: Vec<Keyframe>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub time: RationalTime,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjustTransform {
    pub params: Vec<Param>,
}

/// Content placed on a timeline.
///
/// Nested `children` are anchored to this item; their `offset` is relative
/// to the parent's start and their `lane` must be non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineItem {
    pub kind: ItemKind,
    pub reference: ResourceId,
    pub name: String,
    /// `None` on the primary storyline.
    pub lane: Option<i32>,
    pub offset: RationalTime,
    pub start: Option<RationalTime>,
    pub duration: RationalTime,
    pub transform: Option<AdjustTransform>,
    pub children: Vec<TimelineItem>,
}

impl TimelineItem {
    /// Offset at which the next primary-storyline item starts.
    pub fn end_frames(&self) -> u64 {
        self.offset.frames() + self.duration.frames()
    }

    pub fn element_name(&self) -> &'static str {
        match self.kind {
            ItemKind::AssetClip { .. } => "asset-clip",
            ItemKind::Video => "video",
            ItemKind::RefClip => "ref-clip",
            ItemKind::Title(_) => "title",
        }
    }

    /// Structural form: attributes in document order, then transform,
    /// anchored children, and title text.
    pub fn to_element(&self) -> Element {
        let mut e = Element::new(self.element_name()).with_attr("ref", self.reference.as_str());
        if let Some(lane) = self.lane {
            e.set_attr("lane", lane.to_string());
        }
        e.set_attr("offset", self.offset.to_string());
        e.set_attr("name", self.name.as_str());
        if let Some(start) = self.start {
            e.set_attr("start", start.to_string());
        }
        e.set_attr("duration", self.duration.to_string());

        if let ItemKind::AssetClip { format, audio_role } = &self.kind {
            if let Some(format) = format {
                e.set_attr("format", format.as_str());
            }
            e.set_attr("tcFormat", "NDF");
            if let Some(role) = audio_role {
                e.set_attr("audioRole", role.as_str());
            }
        }

        if let Some(transform) = &self.transform {
            e.push_child(transform_element(transform));
        }
        for child in &self.children {
            e.push_child(child.to_element());
        }
        if let ItemKind::Title(body) = &self.kind {
            e.push_child(
                Element::new("text").with_child(
                    Element::new("text-style")
                        .with_attr("ref", body.style_id.as_str())
                        .with_text(body.text.as_str()),
                ),
            );
            e.push_child(
                Element::new("text-style-def")
                    .with_attr("id", body.style_id.as_str())
                    .with_child(style_element(&body.style)),
            );
        }
        e
    }
}

fn transform_element(transform: &AdjustTransform) -> Element {
    let mut e = Element::new("adjust-transform");
    for param in &transform.params {
        let mut animation = Element::new("keyframeAnimation");
        for keyframe in &param.keyframes {
            animation.push_child(
                Element::new("keyframe")
                    .with_attr("time", keyframe.time.to_string())
                    .with_attr("value", keyframe.value.as_str()),
            );
        }
        e.push_child(
            Element::new("param")
                .with_attr("name", param.name.as_str())
                .with_child(animation),
        );
    }
    e
}

fn style_element(style: &TextStyle) -> Element {
    let mut e = Element::new("text-style")
        .with_attr("font", style.font.as_str())
        .with_attr("fontSize", style.font_size.to_string())
        .with_attr("fontColor", style.font_color.as_str());
    if style.bold {
        e.set_attr("bold", "1");
    }
    e.with_attr("alignment", style.alignment.as_str())
        .with_attr("lineSpacing", style.line_spacing.to_string())
}
