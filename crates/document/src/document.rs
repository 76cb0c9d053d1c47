//! The in-memory project document.
//!
//! A [`Document`] is either a blank template or a file read from disk. The
//! pool entries are lifted out of the tree into typed [`Resource`]s and the
//! sequence element is detached so it can be edited directly. Everything else
//! stays in the generic tree and is written back as read.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use reelsmith_common::{ForgeError, ForgeResult, FrameRate, RationalTime, TimelineDefaults};
use serde::Serialize;

use crate::resource::{Format, ForeignResource, Resource, ResourceId};
use crate::timeline::TimelineItem;
use crate::xml::{self, Element, Node};

/// Path from the root to the sequence element.
const SEQUENCE_PATH: [&str; 4] = ["library", "event", "project", "sequence"];

/// Errors that can occur when reading or writing documents.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("XML error in {path}: {message}")]
    Xml { path: PathBuf, message: String },

    #[error("Unsupported document structure in {path}: {message}")]
    Structure { path: PathBuf, message: String },
}

impl From<DocumentError> for ForgeError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Io { path, source } if source.kind() == std::io::ErrorKind::NotFound => {
                ForgeError::input_not_found(path)
            }
            DocumentError::Io { source, .. } => ForgeError::Io(source),
            DocumentError::Xml { path, message } | DocumentError::Structure { path, message } => {
                ForgeError::structural_load(path, message)
            }
        }
    }
}

/// Counts and totals reported by `info`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub version: String,
    pub frame_duration: String,
    pub resources: BTreeMap<String, usize>,
    pub spine_items: usize,
    pub duration: String,
    pub duration_seconds: f64,
}

/// A project document with an editable resource pool and sequence.
#[derive(Debug, Clone)]
pub struct Document {
    /// Tree with an empty `resources` element and a placeholder sequence.
    root: Element,
    /// Child indices (text nodes included) from the root to the sequence.
    sequence_path: Vec<usize>,
    sequence: Element,
    resources: Vec<Resource>,
    frame_rate: FrameRate,
    origin: Option<PathBuf>,
}

impl Document {
    /// An empty project: one sequence format, an empty spine, duration `0s`.
    pub fn blank(name: &str, defaults: &TimelineDefaults) -> ForgeResult<Self> {
        let frame_rate = defaults.frame_rate()?;
        let format_id = ResourceId::allocated(1);
        let format = Resource::Format(Format {
            id: format_id.clone(),
            name: defaults.format_name.clone(),
            frame_rate: Some(frame_rate),
            width: defaults.width,
            height: defaults.height,
            color_space: defaults.color_space.clone(),
        });

        let now = chrono::Local::now();
        let project = Element::new("project")
            .with_attr("name", name)
            .with_attr("modDate", now.format("%Y-%m-%d %H:%M:%S %z").to_string())
            .with_child(Element::new("sequence"));
        let library = Element::new("library").with_child(
            Element::new("event")
                .with_attr("name", now.format("%-m-%-d-%y").to_string())
                .with_child(project),
        );
        let root = Element::new("fcpxml")
            .with_attr("version", defaults.version.as_str())
            .with_child(Element::new("resources"))
            .with_child(library);

        let sequence = Element::new("sequence")
            .with_attr("format", format_id.as_str())
            .with_attr("duration", "0s")
            .with_attr("tcStart", "0s")
            .with_attr("tcFormat", "NDF")
            .with_attr("audioLayout", "stereo")
            .with_attr("audioRate", "48k")
            .with_child(Element::new("spine"));

        Ok(Self {
            root,
            sequence_path: vec![1, 0, 0, 0],
            sequence,
            resources: vec![format],
            frame_rate,
            origin: None,
        })
    }

    /// Read a document from disk.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut doc = Self::parse(&text, path)?;
        doc.origin = Some(path.to_path_buf());
        tracing::debug!(
            path = %path.display(),
            resources = doc.resources.len(),
            spine_items = doc.spine_item_count(),
            "Loaded document"
        );
        Ok(doc)
    }

    /// Parse document text. `origin` is used for error context only.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, DocumentError> {
        let structure = |message: String| DocumentError::Structure {
            path: origin.to_path_buf(),
            message,
        };

        let mut root = xml::parse(text).map_err(|e| DocumentError::Xml {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        if root.name != "fcpxml" {
            return Err(structure(format!("root element is <{}>, expected <fcpxml>", root.name)));
        }

        let pool = root.child_or_insert("resources");
        let mut resources = Vec::new();
        for node in std::mem::take(&mut pool.children) {
            if let Node::Element(element) = node {
                let name = element.name.clone();
                let resource = ForeignResource::from_element(element)
                    .ok_or_else(|| structure(format!("<{name}> resource has no id")))?;
                resources.push(Resource::Foreign(resource));
            }
        }

        let mut sequence_path = Vec::with_capacity(SEQUENCE_PATH.len());
        let mut cursor = &mut root;
        for name in SEQUENCE_PATH {
            let index = cursor
                .children
                .iter()
                .position(|n| matches!(n, Node::Element(e) if e.name == name))
                .ok_or_else(|| structure(format!("missing <{name}> under <{}>", cursor.name)))?;
            sequence_path.push(index);
            cursor = match &mut cursor.children[index] {
                Node::Element(e) => e,
                Node::Text(_) => return Err(structure(format!("<{name}> is not an element"))),
            };
        }
        let mut sequence = std::mem::replace(cursor, Element::new("sequence"));
        sequence.child_or_insert("spine");

        let mut doc = Self {
            root,
            sequence_path,
            sequence,
            resources,
            frame_rate: FrameRate::default(),
            origin: None,
        };
        let format = doc
            .sequence_format()
            .ok_or_else(|| structure("<sequence> has no format attribute".to_string()))?;
        let format_rate = doc
            .resource(&format)
            .ok_or_else(|| structure(format!("sequence format {format} is not in <resources>")))?
            .frame_rate();
        doc.frame_rate = match format_rate {
            Some(rate) => rate,
            None => {
                tracing::warn!(
                    path = %origin.display(),
                    "Sequence format has no frame duration; assuming {}",
                    FrameRate::default()
                );
                FrameRate::default()
            }
        };
        Ok(doc)
    }

    /// Rebuild the full tree.
    pub fn to_element(&self) -> Element {
        let mut root = self.root.clone();
        let pool = root.child_or_insert("resources");
        pool.children = self
            .resources
            .iter()
            .map(|r| Node::Element(r.to_element()))
            .collect();

        let mut cursor = &mut root;
        for &index in &self.sequence_path {
            cursor = match cursor.children.get_mut(index) {
                Some(Node::Element(e)) => e,
                _ => unreachable!("sequence path is recorded at construction"),
            };
        }
        *cursor = self.sequence.clone();
        root
    }

    pub fn to_xml_string(&self) -> ForgeResult<String> {
        xml::write(&self.to_element()).map_err(|e| ForgeError::Other(e.into()))
    }

    /// Write the document, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> ForgeResult<()> {
        let text = self.to_xml_string()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DocumentError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(path, text).map_err(|e| DocumentError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::info!(path = %path.display(), "Wrote document");
        Ok(())
    }

    /// File this document was loaded from.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.root.attr("version")
    }

    /// Frame rate of the sequence format.
    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    pub fn sequence_format(&self) -> Option<ResourceId> {
        self.sequence.attr("format").map(ResourceId::foreign)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id() == id)
    }

    /// Append to the pool. Identifier checks belong to the caller.
    pub fn push_resource(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    fn spine(&self) -> Option<&Element> {
        self.sequence.child("spine")
    }

    /// Top-level spine elements, in order.
    pub fn spine_items(&self) -> impl Iterator<Item = &Element> {
        self.spine().into_iter().flat_map(|s| s.elements())
    }

    pub fn spine_item_count(&self) -> usize {
        self.spine_items().count()
    }

    /// Sum of the durations of all top-level spine items, in frames.
    ///
    /// Values off the frame grid are rounded to the nearest frame with a
    /// warning; items without a usable duration count as zero.
    pub fn existing_spine_frames(&self) -> u64 {
        let rate = self.frame_rate;
        self.spine_items()
            .filter_map(|item| {
                let value = item.attr("duration")?;
                match rate.rational_to_frames(value) {
                    Ok(frames) => Some(frames),
                    Err(_) => match rate.nearest_frames(value) {
                        Ok(frames) => {
                            tracing::warn!(
                                element = %item.name,
                                duration = value,
                                "Existing item is not frame-aligned; rounding to {frames} frames"
                            );
                            Some(frames)
                        }
                        Err(e) => {
                            tracing::warn!(element = %item.name, "Ignoring item duration: {e}");
                            None
                        }
                    },
                }
            })
            .sum()
    }

    /// Append a primary-storyline item.
    pub fn append_to_spine(&mut self, item: &TimelineItem) {
        self.sequence
            .child_or_insert("spine")
            .push_child(item.to_element());
    }

    pub fn set_sequence_duration(&mut self, duration: RationalTime) {
        self.sequence.set_attr("duration", duration.to_string());
    }

    /// All `text-style-def` ids in the sequence and in compound media.
    pub fn text_style_ids(&self) -> HashSet<String> {
        self.text_style_defs().into_iter().collect()
    }

    fn text_style_defs(&self) -> Vec<String> {
        let pool: Vec<Element> = self.resources.iter().map(Resource::to_element).collect();
        std::iter::once(&self.sequence)
            .chain(pool.iter())
            .flat_map(|root| root.descendants())
            .filter(|e| e.name == "text-style-def")
            .filter_map(|e| e.attr("id").map(str::to_string))
            .collect()
    }

    /// Structural problems the consuming editor would reject.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let rate = self.frame_rate;

        let mut ids = HashSet::new();
        for resource in &self.resources {
            if !ids.insert(resource.id().as_str()) {
                issues.push(format!("Duplicate resource id: {}", resource.id()));
            }
        }

        let pool: Vec<Element> = self.resources.iter().map(Resource::to_element).collect();
        for element in std::iter::once(&self.sequence)
            .chain(pool.iter())
            .flat_map(|root| root.descendants())
        {
            // text-style refs point at text-style-def ids, not the pool.
            if element.name == "text-style" {
                continue;
            }
            for key in ["ref", "format"] {
                if let Some(target) = element.attr(key) {
                    if !ids.contains(target) {
                        issues.push(format!(
                            "<{}> {key}=\"{target}\" does not match any resource",
                            element.name
                        ));
                    }
                }
            }
        }

        let mut running = 0u64;
        for (index, item) in self.spine_items().enumerate() {
            let offset = item.attr("offset").unwrap_or("0s");
            match rate.rational_to_frames(offset) {
                Ok(frames) if frames != running => issues.push(format!(
                    "Spine item {index} <{}> starts at {} but the previous item ends at {}",
                    item.name,
                    rate.time(frames),
                    rate.time(running)
                )),
                Ok(_) => {}
                Err(e) => issues.push(format!("Spine item {index} offset: {e}")),
            }
            match item.attr("duration").map(|d| rate.rational_to_frames(d)) {
                Some(Ok(frames)) => running += frames,
                Some(Err(e)) => issues.push(format!("Spine item {index} duration: {e}")),
                None => issues.push(format!("Spine item {index} <{}> has no duration", item.name)),
            }
        }

        match self.sequence.attr("duration").map(|d| rate.rational_to_frames(d)) {
            Some(Ok(frames)) if frames != running => issues.push(format!(
                "Sequence duration {} does not match spine end {}",
                rate.time(frames),
                rate.time(running)
            )),
            Some(Ok(_)) => {}
            Some(Err(e)) => issues.push(format!("Sequence duration: {e}")),
            None => issues.push("Sequence has no duration".to_string()),
        }

        let mut style_counts: HashMap<String, usize> = HashMap::new();
        for id in self.text_style_defs() {
            *style_counts.entry(id).or_default() += 1;
        }
        let mut duplicates: Vec<_> = style_counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id)
            .collect();
        duplicates.sort();
        for id in duplicates {
            issues.push(format!("Duplicate text-style-def id: {id}"));
        }

        issues
    }

    pub fn summary(&self) -> DocumentSummary {
        let mut resources = BTreeMap::new();
        for resource in &self.resources {
            *resources.entry(resource.kind().to_string()).or_insert(0) += 1;
        }
        let duration = self.frame_rate.time(self.existing_spine_frames());
        DocumentSummary {
            version: self.version().unwrap_or("unknown").to_string(),
            frame_duration: self.frame_rate.to_string(),
            resources,
            spine_items: self.spine_item_count(),
            duration: duration.to_string(),
            duration_seconds: duration.seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;
    use crate::timeline::ItemKind;

    const EXISTING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE fcpxml>
<fcpxml version="1.11">
    <resources>
        <format id="r1" name="FFVideoFormat1080p2398" frameDuration="1001/24000s" width="1920" height="1080"/>
        <asset id="r5" name="intro" uid="ABC" start="0s" duration="240240/24000s" hasVideo="1" format="r1">
            <media-rep kind="original-media" src="file:///media/intro.mov"/>
        </asset>
    </resources>
    <library>
        <event name="old">
            <project name="old">
                <sequence format="r1" duration="360360/24000s" tcStart="0s">
                    <spine>
                        <asset-clip ref="r5" offset="0s" name="intro" duration="240240/24000s"/>
                        <gap name="Gap" offset="240240/24000s" duration="120120/24000s"/>
                    </spine>
                </sequence>
            </project>
        </event>
        <smart-collection name="Projects" match="all"/>
    </library>
</fcpxml>
"#;

    fn existing() -> Document {
        Document::parse(EXISTING, Path::new("existing.fcpxml")).unwrap()
    }

    #[test]
    fn test_blank_document_shape() {
        let doc = Document::blank("demo", &TimelineDefaults::default()).unwrap();
        assert_eq!(doc.frame_rate(), FrameRate::NTSC_23_976);
        assert_eq!(doc.spine_item_count(), 0);
        assert_eq!(doc.existing_spine_frames(), 0);
        assert!(doc.validate().is_empty(), "{:?}", doc.validate());

        let xml = doc.to_xml_string().unwrap();
        assert!(xml.contains("<!DOCTYPE fcpxml>"));
        assert!(xml.contains(r#"frameDuration="1001/24000s""#));
        assert!(xml.contains(r#"<sequence format="r1" duration="0s""#));
    }

    #[test]
    fn test_parse_existing_document() {
        let doc = existing();
        assert_eq!(doc.version(), Some("1.11"));
        assert_eq!(doc.resources().len(), 2);
        assert_eq!(doc.resources()[1].kind(), ResourceKind::Asset);
        assert_eq!(doc.spine_item_count(), 2);
        assert_eq!(doc.existing_spine_frames(), 360);
        assert!(doc.validate().is_empty(), "{:?}", doc.validate());
    }

    #[test]
    fn test_unknown_content_survives_round_trip() {
        let doc = existing();
        let written = doc.to_xml_string().unwrap();
        assert!(written.contains("smart-collection"));

        let again = Document::parse(&written, Path::new("again.fcpxml")).unwrap();
        assert_eq!(again.to_element(), doc.to_element());
    }

    #[test]
    fn test_append_and_duration() {
        let mut doc = existing();
        let rate = doc.frame_rate();
        let item = TimelineItem {
            kind: ItemKind::Video,
            reference: ResourceId::foreign("r5"),
            name: "again".to_string(),
            lane: None,
            offset: rate.time(360),
            start: None,
            duration: rate.time(48),
            transform: None,
            children: Vec::new(),
        };
        doc.append_to_spine(&item);
        doc.set_sequence_duration(rate.time(408));

        assert_eq!(doc.spine_item_count(), 3);
        assert_eq!(doc.existing_spine_frames(), 408);
        assert!(doc.validate().is_empty(), "{:?}", doc.validate());
    }

    #[test]
    fn test_validate_reports_problems() {
        let broken = EXISTING
            .replace(r#"<asset-clip ref="r5""#, r#"<asset-clip ref="r9""#)
            .replace(r#"duration="360360/24000s""#, r#"duration="21600000/24000s""#)
            .replace(r#"<asset id="r5""#, r#"<asset id="r1""#);
        let doc = Document::parse(&broken, Path::new("broken.fcpxml")).unwrap();
        let issues = doc.validate();

        assert!(issues.iter().any(|i| i.contains("Duplicate resource id: r1")));
        assert!(issues.iter().any(|i| i.contains("ref=\"r9\"")));
        assert!(issues.iter().any(|i| i.contains("Sequence duration")));
    }

    #[test]
    fn test_structure_errors() {
        let err = Document::parse("<fcpxml><resources/></fcpxml>", Path::new("x.fcpxml"))
            .unwrap_err();
        assert!(matches!(err, DocumentError::Structure { .. }));

        let err = Document::parse("<fcpxml><library>", Path::new("x.fcpxml")).unwrap_err();
        assert!(matches!(err, DocumentError::Xml { .. }));

        let forge: ForgeError = err.into();
        assert!(matches!(forge, ForgeError::StructuralLoad { .. }));
    }

    #[test]
    fn test_sequence_without_usable_format_is_rejected() {
        let no_format = EXISTING.replace(r#"<sequence format="r1" "#, "<sequence ");
        let err = Document::parse(&no_format, Path::new("x.fcpxml")).unwrap_err();
        assert!(matches!(err, DocumentError::Structure { .. }));
        let forge: ForgeError = err.into();
        assert!(matches!(forge, ForgeError::StructuralLoad { .. }));

        let dangling = EXISTING.replace(r#"<sequence format="r1" "#, r#"<sequence format="r7" "#);
        let err = Document::parse(&dangling, Path::new("x.fcpxml")).unwrap_err();
        assert!(err.to_string().contains("r7"), "{err}");
    }

    #[test]
    fn test_missing_file_maps_to_input_not_found() {
        let err = Document::load(Path::new("/nonexistent/reelsmith/doc.fcpxml")).unwrap_err();
        let forge: ForgeError = err.into();
        assert!(matches!(forge, ForgeError::InputNotFound { .. }));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join("reelsmith_test_document_save");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("out.fcpxml");

        let doc = Document::blank("saved", &TimelineDefaults::default()).unwrap();
        doc.save(&path).unwrap();
        let loaded = Document::load(&path).unwrap();
        assert_eq!(loaded.origin(), Some(path.as_path()));
        assert_eq!(loaded.resources().len(), 1);
        assert_eq!(loaded.frame_rate(), FrameRate::NTSC_23_976);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
