//! Entries of the document's resource pool.
//!
//! Resources created in this process are typed ([`Format`], [`MediaAsset`],
//! [`Effect`], [`CompoundMedia`]). Resources read from an existing file stay
//! [`ForeignResource`]s: the raw element is written back unchanged and only
//! the handful of attributes needed for lookups are exposed.

use std::fmt;
use std::path::{Path, PathBuf};

use reelsmith_common::{FrameRate, RationalTime};
use serde::Serialize;

use crate::timeline::TimelineItem;
use crate::xml::Element;

/// Document-unique resource identifier.
///
/// Allocated identifiers have the form `r{n}`; foreign identifiers are kept
/// as read, whatever their shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Identifier for allocation counter value `n`.
    pub fn allocated(n: u64) -> Self {
        Self(format!("r{n}"))
    }

    /// Wrap an identifier read from a file.
    pub fn foreign(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric part of an `r{n}` identifier.
    pub fn numeric_suffix(&self) -> Option<u64> {
        let digits = self.0.strip_prefix('r')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource category, named after the element that stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Format,
    Asset,
    Effect,
    Media,
    Other,
}

impl ResourceKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "format" => Self::Format,
            "asset" => Self::Asset,
            "effect" => Self::Effect,
            "media" => Self::Media,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Format => "format",
            Self::Asset => "asset",
            Self::Effect => "effect",
            Self::Media => "media",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Video format definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    pub id: ResourceId,
    pub name: String,
    /// `None` for rate-undefined formats used by still images.
    pub frame_rate: Option<FrameRate>,
    pub width: u32,
    pub height: u32,
    pub color_space: String,
}

/// What a media asset carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    /// Classify a file by extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tif" | "tiff" | "heic" | "webp" => {
                Self::Image
            }
            "wav" | "mp3" | "m4a" | "aac" | "aif" | "aiff" | "flac" | "caf" => Self::Audio,
            _ => Self::Video,
        }
    }
}

/// A media file reference.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub id: ResourceId,
    pub name: String,
    /// Content UID, stable for a given file name.
    pub uid: String,
    /// Absolute source path.
    pub source: PathBuf,
    pub kind: MediaKind,
    /// Media duration; zero for stills.
    pub duration: RationalTime,
    /// Format of the visual stream; audio-only assets have none.
    pub format: Option<ResourceId>,
}

/// An effect or title template.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub id: ResourceId,
    pub name: String,
    pub uid: String,
}

/// Compound-clip container holding a nested timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundMedia {
    pub id: ResourceId,
    pub name: String,
    pub uid: String,
    pub format: ResourceId,
    pub duration: RationalTime,
    pub items: Vec<TimelineItem>,
}

/// A resource read from an existing file, kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignResource {
    id: ResourceId,
    element: Element,
}

impl ForeignResource {
    /// Wrap a raw pool element. Returns `None` when it carries no `id`.
    pub fn from_element(element: Element) -> Option<Self> {
        let id = ResourceId::foreign(element.attr("id")?);
        Some(Self { id, element })
    }

    pub fn kind(&self) -> ResourceKind {
        ResourceKind::from_tag(&self.element.name)
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn name(&self) -> Option<&str> {
        self.element.attr("name")
    }

    /// Media location from `media-rep/@src` or the legacy `src` attribute.
    pub fn source_path(&self) -> Option<PathBuf> {
        let src = self
            .element
            .child("media-rep")
            .and_then(|rep| rep.attr("src"))
            .or_else(|| self.element.attr("src"))?;
        Some(file_url_to_path(src))
    }

    pub fn frame_rate(&self) -> Option<FrameRate> {
        self.element.attr("frameDuration")?.parse().ok()
    }
}

/// Any entry of the resource pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Format(Format),
    Asset(MediaAsset),
    Effect(Effect),
    Compound(CompoundMedia),
    Foreign(ForeignResource),
}

impl Resource {
    pub fn id(&self) -> &ResourceId {
        match self {
            Self::Format(f) => &f.id,
            Self::Asset(a) => &a.id,
            Self::Effect(e) => &e.id,
            Self::Compound(m) => &m.id,
            Self::Foreign(r) => &r.id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Format(_) => ResourceKind::Format,
            Self::Asset(_) => ResourceKind::Asset,
            Self::Effect(_) => ResourceKind::Effect,
            Self::Compound(_) => ResourceKind::Media,
            Self::Foreign(r) => r.kind(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Format(f) => Some(&f.name),
            Self::Asset(a) => Some(&a.name),
            Self::Effect(e) => Some(&e.name),
            Self::Compound(m) => Some(&m.name),
            Self::Foreign(r) => r.name(),
        }
    }

    /// Absolute source path of a media asset.
    pub fn source_path(&self) -> Option<PathBuf> {
        match self {
            Self::Asset(a) => Some(a.source.clone()),
            Self::Foreign(r) if r.kind() == ResourceKind::Asset => r.source_path(),
            _ => None,
        }
    }

    pub fn frame_rate(&self) -> Option<FrameRate> {
        match self {
            Self::Format(f) => f.frame_rate,
            Self::Foreign(r) => r.frame_rate(),
            _ => None,
        }
    }

    /// Declared media duration in frames of `rate`.
    ///
    /// Foreign durations off the frame grid are rounded to the nearest frame.
    pub fn duration_frames(&self, rate: FrameRate) -> Option<u64> {
        match self {
            Self::Asset(a) => Some(a.duration.frames()),
            Self::Compound(m) => Some(m.duration.frames()),
            Self::Foreign(r) => rate.nearest_frames(r.element.attr("duration")?).ok(),
            Self::Format(_) | Self::Effect(_) => None,
        }
    }

    /// Structural form for the pool.
    pub fn to_element(&self) -> Element {
        match self {
            Self::Format(f) => {
                let mut e = Element::new("format")
                    .with_attr("id", f.id.as_str())
                    .with_attr("name", f.name.as_str());
                if let Some(rate) = f.frame_rate {
                    e.set_attr("frameDuration", rate.to_string());
                }
                e.with_attr("width", f.width.to_string())
                    .with_attr("height", f.height.to_string())
                    .with_attr("colorSpace", f.color_space.as_str())
            }
            Self::Asset(a) => asset_element(a),
            Self::Effect(fx) => Element::new("effect")
                .with_attr("id", fx.id.as_str())
                .with_attr("name", fx.name.as_str())
                .with_attr("uid", fx.uid.as_str()),
            Self::Compound(m) => {
                let mut spine = Element::new("spine");
                for item in &m.items {
                    spine.push_child(item.to_element());
                }
                let sequence = Element::new("sequence")
                    .with_attr("format", m.format.as_str())
                    .with_attr("duration", m.duration.to_string())
                    .with_attr("tcStart", "0s")
                    .with_attr("tcFormat", "NDF")
                    .with_attr("audioLayout", "stereo")
                    .with_attr("audioRate", "48k")
                    .with_child(spine);
                Element::new("media")
                    .with_attr("id", m.id.as_str())
                    .with_attr("name", m.name.as_str())
                    .with_attr("uid", m.uid.as_str())
                    .with_child(sequence)
            }
            Self::Foreign(r) => r.element.clone(),
        }
    }
}

fn asset_element(a: &MediaAsset) -> Element {
    let mut e = Element::new("asset")
        .with_attr("id", a.id.as_str())
        .with_attr("name", a.name.as_str())
        .with_attr("uid", a.uid.as_str())
        .with_attr("start", "0s")
        .with_attr("duration", a.duration.to_string());

    if a.kind != MediaKind::Audio {
        e.set_attr("hasVideo", "1");
    }
    if let Some(format) = &a.format {
        e.set_attr("format", format.as_str());
    }
    match a.kind {
        MediaKind::Image => e.set_attr("videoSources", "1"),
        MediaKind::Video | MediaKind::Audio => {
            if a.kind == MediaKind::Video {
                e.set_attr("videoSources", "1");
            }
            e.set_attr("hasAudio", "1");
            e.set_attr("audioSources", "1");
            e.set_attr("audioChannels", "2");
            e.set_attr("audioRate", "48000");
        }
    }

    e.with_child(
        Element::new("media-rep")
            .with_attr("kind", "original-media")
            .with_attr("sig", a.uid.as_str())
            .with_attr("src", path_to_file_url(&a.source)),
    )
}

/// `file://` URL for an absolute path, percent-encoding reserved bytes.
pub fn path_to_file_url(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut url = String::with_capacity(raw.len() + 7);
    url.push_str("file://");
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'/' | b'-' | b'_' | b'.' | b'~' => {
                url.push(byte as char)
            }
            _ => url.push_str(&format!("%{byte:02X}")),
        }
    }
    url
}

/// Inverse of [`path_to_file_url`]; plain paths pass through unchanged.
pub fn file_url_to_path(url: &str) -> PathBuf {
    let raw = url.strip_prefix("file://").unwrap_or(url);
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(v) = decoded {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    PathBuf::from(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_numeric_suffix() {
        assert_eq!(ResourceId::allocated(7).numeric_suffix(), Some(7));
        assert_eq!(ResourceId::foreign("r42").numeric_suffix(), Some(42));
        assert_eq!(ResourceId::foreign("ts1").numeric_suffix(), None);
        assert_eq!(ResourceId::foreign("r").numeric_suffix(), None);
        assert_eq!(ResourceId::foreign("r1a").numeric_suffix(), None);
    }

    #[test]
    fn test_media_kind_from_extension() {
        assert_eq!(MediaKind::from_path(Path::new("/a/b.PNG")), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("/a/b.wav")), MediaKind::Audio);
        assert_eq!(MediaKind::from_path(Path::new("/a/b.mov")), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("/a/noext")), MediaKind::Video);
    }

    #[test]
    fn test_file_url_round_trip() {
        let path = Path::new("/Users/me/My Clips/take #1.mov");
        let url = path_to_file_url(path);
        assert_eq!(url, "file:///Users/me/My%20Clips/take%20%231.mov");
        assert_eq!(file_url_to_path(&url), path);
        assert_eq!(file_url_to_path("/plain/path.mov"), Path::new("/plain/path.mov"));
    }

    #[test]
    fn test_image_asset_flags() {
        let asset = MediaAsset {
            id: ResourceId::allocated(3),
            name: "still".to_string(),
            uid: "UID".to_string(),
            source: PathBuf::from("/tmp/still.png"),
            kind: MediaKind::Image,
            duration: RationalTime::zero(FrameRate::NTSC_23_976),
            format: Some(ResourceId::allocated(2)),
        };
        let e = Resource::Asset(asset).to_element();
        assert_eq!(e.attr("duration"), Some("0s"));
        assert_eq!(e.attr("hasVideo"), Some("1"));
        assert_eq!(e.attr("hasAudio"), None);
        assert_eq!(e.child("media-rep").unwrap().attr("src"), Some("file:///tmp/still.png"));
    }

    #[test]
    fn test_audio_asset_has_no_format_or_video() {
        let asset = MediaAsset {
            id: ResourceId::allocated(4),
            name: "voice".to_string(),
            uid: "UID".to_string(),
            source: PathBuf::from("/tmp/voice.wav"),
            kind: MediaKind::Audio,
            duration: FrameRate::NTSC_23_976.time(48),
            format: None,
        };
        let e = Resource::Asset(asset).to_element();
        assert_eq!(e.attr("format"), None);
        assert_eq!(e.attr("hasVideo"), None);
        assert_eq!(e.attr("audioRate"), Some("48000"));
        assert_eq!(e.attr("duration"), Some("48048/24000s"));
    }

    #[test]
    fn test_foreign_resource_exposes_lookup_fields() {
        let element = Element::new("asset")
            .with_attr("id", "r12")
            .with_attr("name", "old")
            .with_child(Element::new("media-rep").with_attr("src", "file:///media/old%20clip.mov"));
        let foreign = ForeignResource::from_element(element.clone()).unwrap();
        let resource = Resource::Foreign(foreign);
        assert_eq!(resource.kind(), ResourceKind::Asset);
        assert_eq!(resource.id().numeric_suffix(), Some(12));
        assert_eq!(resource.source_path(), Some(PathBuf::from("/media/old clip.mov")));
        assert_eq!(resource.to_element(), element);
        assert_eq!(resource.duration_frames(FrameRate::NTSC_23_976), None);

        assert!(ForeignResource::from_element(Element::new("format")).is_none());
    }

    #[test]
    fn test_foreign_duration_snaps_to_frames() {
        let rate = FrameRate::NTSC_23_976;
        let aligned = Element::new("asset")
            .with_attr("id", "r3")
            .with_attr("duration", "240240/24000s");
        let seconds = Element::new("asset")
            .with_attr("id", "r4")
            .with_attr("duration", "2s");
        let aligned = Resource::Foreign(ForeignResource::from_element(aligned).unwrap());
        let seconds = Resource::Foreign(ForeignResource::from_element(seconds).unwrap());
        assert_eq!(aligned.duration_frames(rate), Some(240));
        assert_eq!(seconds.duration_frames(rate), Some(48));
    }

    proptest! {
        #[test]
        fn prop_file_url_round_trips_any_path(path in "(/[^/\\x00]{1,12}){1,5}") {
            let url = path_to_file_url(Path::new(&path));
            prop_assert!(url.starts_with("file:///"));
            prop_assert!(url.is_ascii());
            prop_assert!(!url.contains(' '));
            prop_assert_eq!(file_url_to_path(&url), PathBuf::from(&path));
        }
    }
}
