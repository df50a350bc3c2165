use std::collections::HashMap;

use crate::error::SyncError;
use crate::sync::{EntityId, TransformSync};

/// Owned table of synced entities for one world session.
///
/// Entities live in a contiguous `Vec` so the per-tick pass walks memory in
/// order; the id and name maps only point into it. Create one when the world
/// starts and [`EntityRegistry::clear`] it when the world stops.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    slots: Vec<TransformSync>,
    names: Vec<Option<String>>,
    index: HashMap<EntityId, usize>,
    by_name: HashMap<String, EntityId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sync: TransformSync) -> Result<EntityId, SyncError> {
        self.insert_inner(sync, None)
    }

    pub fn insert_named(&mut self, name: &str, sync: TransformSync) -> Result<EntityId, SyncError> {
        if let Some(existing) = self.by_name.get(name) {
            return Err(SyncError::DuplicateEntity(*existing));
        }
        self.insert_inner(sync, Some(name.to_owned()))
    }

    fn insert_inner(&mut self, sync: TransformSync, name: Option<String>) -> Result<EntityId, SyncError> {
        let id = sync.id();
        if self.index.contains_key(&id) {
            return Err(SyncError::DuplicateEntity(id));
        }

        self.index.insert(id, self.slots.len());
        if let Some(name) = &name {
            self.by_name.insert(name.clone(), id);
        }
        self.slots.push(sync);
        self.names.push(name);
        Ok(id)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<TransformSync> {
        let slot = self.index.remove(&id)?;
        let removed = self.slots.swap_remove(slot);
        if let Some(name) = self.names.swap_remove(slot) {
            self.by_name.remove(&name);
        }

        if let Some(moved) = self.slots.get(slot) {
            self.index.insert(moved.id(), slot);
        }
        Some(removed)
    }

    pub fn get(&self, id: EntityId) -> Option<&TransformSync> {
        self.index.get(&id).map(|&slot| &self.slots[slot])
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut TransformSync> {
        self.index.get(&id).map(|&slot| &mut self.slots[slot])
    }

    pub fn by_name(&self, name: &str) -> Option<&TransformSync> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformSync> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TransformSync> {
        self.slots.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        log::info!("clearing {} synced entities", self.slots.len());
        self.slots.clear();
        self.names.clear();
        self.index.clear();
        self.by_name.clear();
    }
}
