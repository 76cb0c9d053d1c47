//! Resource registry: identifier allocation and pool lookups.
//!
//! The registry owns the [`Document`] for the whole session. Identifiers are
//! handed out from a monotonic counter that starts above the largest `r{n}`
//! already present in any resource category, and the counter never moves
//! backwards, so an identifier seen by any caller is never issued again.

use std::path::Path;

use reelsmith_common::{ForgeError, ForgeResult, RationalTime};
use reelsmith_document::{Document, Resource, ResourceId, ResourceKind, TimelineItem};
use sha2::{Digest, Sha256};

/// Owner of the document and its identifier space.
#[derive(Debug)]
pub struct ResourceRegistry {
    document: Document,
    /// Next counter value to hand out.
    next_id: u64,
}

impl ResourceRegistry {
    pub fn new(document: Document) -> Self {
        let next_id = max_numeric_suffix(&document).map_or(1, |max| max.saturating_add(1));
        Self { document, next_id }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Issue `n` identifiers that no resource uses and no caller has seen.
    pub fn allocate_identifiers(&mut self, n: usize) -> ForgeResult<Vec<ResourceId>> {
        // Rescan in case the pool was extended without going through us.
        let floor = max_numeric_suffix(&self.document).map_or(1, |max| max.saturating_add(1));
        let start = self.next_id.max(floor);
        let end = start
            .checked_add(n as u64)
            .filter(|end| *end < u64::MAX)
            .ok_or(ForgeError::IdentifierExhausted)?;

        self.next_id = end;
        let ids: Vec<ResourceId> = (start..end).map(ResourceId::allocated).collect();
        tracing::trace!(count = n, first = start, "Allocated identifiers");
        Ok(ids)
    }

    /// The media asset already registered for an exact absolute path.
    pub fn find_existing_asset_by_path(&self, path: &Path) -> Option<&Resource> {
        self.document
            .resources()
            .iter()
            .filter(|r| r.kind() == ResourceKind::Asset)
            .find(|r| r.source_path().as_deref() == Some(path))
    }

    pub fn find_format_by_name(&self, name: &str) -> Option<&ResourceId> {
        self.find_by_name(ResourceKind::Format, name)
    }

    pub fn find_effect_by_name(&self, name: &str) -> Option<&ResourceId> {
        self.find_by_name(ResourceKind::Effect, name)
    }

    fn find_by_name(&self, kind: ResourceKind, name: &str) -> Option<&ResourceId> {
        self.document
            .resources()
            .iter()
            .find(|r| r.kind() == kind && r.name() == Some(name))
            .map(Resource::id)
    }

    /// A compound media created earlier with this UID and exactly this content.
    pub fn find_compound(
        &self,
        uid: &str,
        duration: RationalTime,
        items: &[TimelineItem],
    ) -> Option<&ResourceId> {
        self.document.resources().iter().find_map(|r| match r {
            Resource::Compound(m) if m.uid == uid && m.duration == duration && m.items == items => {
                Some(&m.id)
            }
            _ => None,
        })
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.document.resource(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resource(id).is_some()
    }

    /// Content UID for a media file, derived from its file name only.
    ///
    /// The editor binds a UID to a file at first import, so the same name
    /// must map to the same UID no matter which directory it is read from.
    pub fn compute_content_uid(file_name: &str) -> String {
        let digest = Sha256::digest(file_name.as_bytes());
        let hex: String = digest[..16].iter().map(|b| format!("{b:02X}")).collect();
        format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }

    /// [`Self::compute_content_uid`] of a path's final component.
    pub fn content_uid_for_path(path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self::compute_content_uid(&name)
    }

    /// Add a resource to the pool. Fails if its identifier is already taken.
    pub fn register(&mut self, resource: Resource) -> ForgeResult<()> {
        if self.contains(resource.id()) {
            return Err(ForgeError::transaction(format!(
                "resource id {} is already registered",
                resource.id()
            )));
        }
        tracing::debug!(id = %resource.id(), kind = %resource.kind(), "Registered resource");
        self.document.push_resource(resource);
        Ok(())
    }
}

fn max_numeric_suffix(document: &Document) -> Option<u64> {
    document
        .resources()
        .iter()
        .filter_map(|r| r.id().numeric_suffix())
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsmith_common::TimelineDefaults;
    use reelsmith_document::{Effect, ForeignResource, Resource};
    use reelsmith_document::xml::Element;

    fn blank() -> ResourceRegistry {
        ResourceRegistry::new(Document::blank("t", &TimelineDefaults::default()).unwrap())
    }

    #[test]
    fn test_allocation_starts_above_existing_ids() {
        let mut registry = blank();
        let ids = registry.allocate_identifiers(3).unwrap();
        assert_eq!(
            ids,
            vec![
                ResourceId::allocated(2),
                ResourceId::allocated(3),
                ResourceId::allocated(4)
            ]
        );
    }

    #[test]
    fn test_allocation_scans_every_category() {
        let mut doc = Document::blank("t", &TimelineDefaults::default()).unwrap();
        doc.push_resource(Resource::Foreign(
            ForeignResource::from_element(Element::new("media").with_attr("id", "r40")).unwrap(),
        ));
        doc.push_resource(Resource::Foreign(
            ForeignResource::from_element(Element::new("effect").with_attr("id", "r7")).unwrap(),
        ));
        let mut registry = ResourceRegistry::new(doc);
        assert_eq!(registry.allocate_identifiers(1).unwrap(), vec![ResourceId::allocated(41)]);
    }

    #[test]
    fn test_allocation_never_repeats() {
        let mut registry = blank();
        let first = registry.allocate_identifiers(2).unwrap();
        let second = registry.allocate_identifiers(2).unwrap();
        assert!(first.iter().all(|id| !second.contains(id)));
        assert_eq!(registry.allocate_identifiers(0).unwrap(), Vec::new());
    }

    #[test]
    fn test_register_rejects_duplicate_id() {
        let mut registry = blank();
        let effect = Resource::Effect(Effect {
            id: ResourceId::allocated(1),
            name: "Text".to_string(),
            uid: "x".to_string(),
        });
        let err = registry.register(effect).unwrap_err();
        assert!(matches!(err, ForgeError::Transaction { .. }));
    }

    #[test]
    fn test_content_uid_depends_on_name_only() {
        let a = ResourceRegistry::content_uid_for_path(Path::new("/one/dir/clip.mov"));
        let b = ResourceRegistry::content_uid_for_path(Path::new("/other/place/clip.mov"));
        let c = ResourceRegistry::content_uid_for_path(Path::new("/one/dir/clip2.mov"));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let parts: Vec<_> = a.split('-').map(str::len).collect();
        assert_eq!(parts, vec![8, 4, 4, 4, 12]);
        assert!(a.chars().all(|c| c == '-' || c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_lookup_by_name() {
        let registry = blank();
        assert_eq!(
            registry.find_format_by_name("FFVideoFormat720p2398"),
            Some(&ResourceId::allocated(1))
        );
        assert!(registry.find_effect_by_name("Text").is_none());
    }
}
