//! Materialised views over every entity holding a required set of component types.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::component::{ComponentId, ComponentStore};
use crate::entity::{Entity, EntityStore};

/// Index of a registered family. Stable for the lifetime of the [`FamilyIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FamilyHandle(pub(crate) usize);

struct FamilyData {
    /// Sorted, deduplicated requirement set.
    required: Vec<ComponentId>,
    /// Matching entities in insertion order.
    members: Vec<Entity>,
    contains: HashSet<Entity>,
}

impl FamilyData {
    fn push(&mut self, entity: Entity) -> bool {
        if !self.contains.insert(entity) {
            return false;
        }
        self.members.push(entity);
        true
    }

    fn remove(&mut self, entity: Entity) -> bool {
        if !self.contains.remove(&entity) {
            return false;
        }
        // Order-preserving: listeners mirror display order from this list.
        if let Some(pos) = self.members.iter().position(|&e| e == entity) {
            self.members.remove(pos);
        }
        true
    }
}

/// Keeps every registered family's member list in sync with the component store.
///
/// Updates are incremental: only families that require the component type named by
/// an add/remove are re-checked, and a check costs one membership test per required
/// type.
pub struct FamilyIndex {
    families: Vec<FamilyData>,
    by_signature: HashMap<Vec<ComponentId>, FamilyHandle>,
    by_component: HashMap<ComponentId, Vec<FamilyHandle>>,
    /// Families with an empty requirement set; they track entity lifetime directly.
    universal: Vec<FamilyHandle>,
}

impl FamilyIndex {
    pub fn new() -> Self {
        Self {
            families: Vec::new(),
            by_signature: HashMap::new(),
            by_component: HashMap::new(),
            universal: Vec::new(),
        }
    }

    fn signature(required: &[ComponentId]) -> Vec<ComponentId> {
        let mut signature = required.to_vec();
        signature.sort_by_key(|id| id.name());
        signature.dedup();
        signature
    }

    /// Return the family for exactly this requirement set, creating and backfilling it
    /// from the alive entities on first registration.
    pub fn register(
        &mut self,
        required: &[ComponentId],
        entities: &EntityStore,
        components: &ComponentStore,
    ) -> FamilyHandle {
        let signature = Self::signature(required);
        if let Some(&handle) = self.by_signature.get(&signature) {
            return handle;
        }

        let handle = FamilyHandle(self.families.len());
        let mut data = FamilyData {
            required: signature.clone(),
            members: Vec::new(),
            contains: HashSet::new(),
        };
        for entity in entities.iter() {
            if components.has_all(&signature, entity) {
                data.push(entity);
            }
        }
        debug!(
            family = handle.0,
            required = ?signature,
            backfilled = data.members.len(),
            "family registered"
        );

        for &id in &signature {
            self.by_component.entry(id).or_default().push(handle);
        }
        if signature.is_empty() {
            self.universal.push(handle);
        }
        self.by_signature.insert(signature, handle);
        self.families.push(data);
        handle
    }

    /// Called after `entity` was allocated.
    pub fn entity_created(&mut self, entity: Entity) {
        for handle in &self.universal {
            self.families[handle.0].push(entity);
        }
    }

    /// Called after every component of `entity` was detached.
    pub fn entity_destroyed(&mut self, entity: Entity) {
        for handle in &self.universal {
            self.families[handle.0].remove(entity);
        }
    }

    /// Called after `component` was attached to `entity`.
    pub fn component_added(
        &mut self,
        component: ComponentId,
        entity: Entity,
        components: &ComponentStore,
    ) {
        let Some(handles) = self.by_component.get(&component) else {
            return;
        };
        for handle in handles {
            let family = &mut self.families[handle.0];
            if components.has_all(&family.required, entity) {
                family.push(entity);
            }
        }
    }

    /// Called after `component` was detached from `entity`.
    pub fn component_removed(&mut self, component: ComponentId, entity: Entity) {
        let Some(handles) = self.by_component.get(&component) else {
            return;
        };
        for handle in handles {
            self.families[handle.0].remove(entity);
        }
    }

    /// Matching entities in insertion order. Empty for an unknown handle.
    pub fn members(&self, handle: FamilyHandle) -> &[Entity] {
        self.families
            .get(handle.0)
            .map_or(&[], |family| family.members.as_slice())
    }

    /// The requirement set of a family.
    #[cfg(test)]
    pub fn required(&self, handle: FamilyHandle) -> &[ComponentId] {
        self.families
            .get(handle.0)
            .map_or(&[], |family| family.required.as_slice())
    }

    pub fn contains(&self, handle: FamilyHandle, entity: Entity) -> bool {
        self.families
            .get(handle.0)
            .is_some_and(|family| family.contains.contains(&entity))
    }

    /// Number of registered families.
    pub fn len(&self) -> usize {
        self.families.len()
    }
}

impl Default for FamilyIndex {
    fn default() -> Self {
        Self::new()
    }
}
