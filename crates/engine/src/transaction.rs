//! Staged, all-or-nothing resource creation.
//!
//! A [`ResourceTransaction`] borrows the registry mutably for its whole
//! lifetime, so nothing else can touch the pool while resources are staged.
//! [`commit`](ResourceTransaction::commit) and
//! [`rollback`](ResourceTransaction::rollback) consume the transaction;
//! dropping an open one rolls it back. Identifiers reserved through a
//! transaction are spent either way.

use std::collections::HashSet;
use std::path::Path;

use reelsmith_common::{ForgeError, ForgeResult};
use reelsmith_document::{CompoundMedia, Effect, Format, MediaAsset, Resource, ResourceId};

use crate::registry::ResourceRegistry;

pub struct ResourceTransaction<'r> {
    registry: &'r mut ResourceRegistry,
    reserved: HashSet<ResourceId>,
    staged: Vec<Resource>,
    open: bool,
}

impl<'r> ResourceTransaction<'r> {
    pub fn begin(registry: &'r mut ResourceRegistry) -> Self {
        Self {
            registry,
            reserved: HashSet::new(),
            staged: Vec::new(),
            open: true,
        }
    }

    /// Read access to the committed pool.
    pub fn registry(&self) -> &ResourceRegistry {
        self.registry
    }

    pub fn staged(&self) -> &[Resource] {
        &self.staged
    }

    /// Reserve `n` fresh identifiers for resources staged in this transaction.
    pub fn reserve_identifiers(&mut self, n: usize) -> ForgeResult<Vec<ResourceId>> {
        let ids = self.registry.allocate_identifiers(n)?;
        self.reserved.extend(ids.iter().cloned());
        Ok(ids)
    }

    pub fn stage_format(&mut self, format: Format) -> ForgeResult<ResourceId> {
        self.stage(Resource::Format(format))
    }

    pub fn stage_asset(&mut self, asset: MediaAsset) -> ForgeResult<ResourceId> {
        self.stage(Resource::Asset(asset))
    }

    pub fn stage_effect(&mut self, effect: Effect) -> ForgeResult<ResourceId> {
        self.stage(Resource::Effect(effect))
    }

    pub fn stage_compound(&mut self, media: CompoundMedia) -> ForgeResult<ResourceId> {
        self.stage(Resource::Compound(media))
    }

    fn stage(&mut self, resource: Resource) -> ForgeResult<ResourceId> {
        let id = resource.id().clone();
        if !self.reserved.contains(&id) {
            return Err(ForgeError::transaction(format!(
                "resource id {id} was not reserved by this transaction"
            )));
        }
        if self.staged.iter().any(|r| r.id() == &id) {
            return Err(ForgeError::transaction(format!(
                "resource id {id} is already staged"
            )));
        }
        self.staged.push(resource);
        Ok(id)
    }

    /// Asset for `path`, staged here or already registered.
    pub fn find_asset_by_path(&self, path: &Path) -> Option<&Resource> {
        self.staged
            .iter()
            .find(|r| matches!(r, Resource::Asset(a) if a.source == path))
            .or_else(|| self.registry.find_existing_asset_by_path(path))
    }

    /// Register every staged resource in staging order.
    ///
    /// All identifiers are checked before the first one is registered, so a
    /// failed commit leaves the pool untouched.
    pub fn commit(mut self) -> ForgeResult<Vec<ResourceId>> {
        self.open = false;
        let staged = std::mem::take(&mut self.staged);

        for resource in &staged {
            if self.registry.contains(resource.id()) {
                return Err(ForgeError::transaction(format!(
                    "resource id {} collides with a registered resource",
                    resource.id()
                )));
            }
        }

        let mut committed = Vec::with_capacity(staged.len());
        for resource in staged {
            committed.push(resource.id().clone());
            self.registry.register(resource)?;
        }
        tracing::debug!(resources = committed.len(), "Committed transaction");
        Ok(committed)
    }

    /// Discard staged resources. Reserved identifiers stay spent.
    pub fn rollback(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if self.open {
            self.open = false;
            tracing::debug!(
                staged = self.staged.len(),
                reserved = self.reserved.len(),
                "Rolled back transaction"
            );
            self.staged.clear();
        }
    }
}

impl Drop for ResourceTransaction<'_> {
    fn drop(&mut self) {
        self.discard();
    }
}
