use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::entity::Entity;

/// Marker trait for types that can be stored as ECS components.
pub trait Component: 'static + Send + Sync {}

/// Blanket implementation: any `'static + Send + Sync` type is a valid component.
impl<T: 'static + Send + Sync> Component for T {}

/// Stable tag for a component *type*. Used to key storage, describe family
/// requirements, and label lifecycle events.
#[derive(Clone, Copy)]
pub struct ComponentId {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentId {
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Full type path of the component.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        let start = base.rfind("::").map_or(0, |i| i + 2);
        &self.name[start..]
    }

    pub fn is<T: Component>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for ComponentId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentId {}

impl Hash for ComponentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.short_name())
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Type-erased component storage interface.
pub(crate) trait ComponentStorage: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn take_boxed(&mut self, entity: Entity) -> Option<Box<dyn Any + Send + Sync>>;
    fn has(&self, entity: Entity) -> bool;
    fn len(&self) -> usize;
}

/// Sparse-set storage for a single component type. Provides O(1) insert/remove/lookup
/// and dense iteration.
pub(crate) struct SparseSet<T> {
    /// Maps entity index → dense index. `None` means the slot has no component.
    sparse: Vec<Option<usize>>,
    /// Packed component values.
    dense: Vec<T>,
    /// Owner of each dense slot, generation included, so a stale handle whose slot
    /// was recycled never reads the successor's component.
    owners: Vec<Entity>,
}

impl<T: Component> SparseSet<T> {
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            owners: Vec::new(),
        }
    }

    fn dense_index(&self, entity: Entity) -> Option<usize> {
        let dense_idx = (*self.sparse.get(entity.index as usize)?)?;
        (self.owners[dense_idx] == entity).then_some(dense_idx)
    }

    /// Insert a component for the given entity. The slot must be empty.
    pub fn insert(&mut self, entity: Entity, value: T) {
        let idx = entity.index as usize;
        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, None);
        }
        debug_assert!(self.sparse[idx].is_none(), "slot {idx} already occupied");
        let dense_idx = self.dense.len();
        self.sparse[idx] = Some(dense_idx);
        self.dense.push(value);
        self.owners.push(entity);
    }

    /// Get an immutable reference to the component for an entity.
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.dense_index(entity).map(|i| &self.dense[i])
    }

    /// Get a mutable reference to the component for an entity.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.dense_index(entity).map(|i| &mut self.dense[i])
    }

    /// Remove and return the component for an entity.
    pub fn take(&mut self, entity: Entity) -> Option<T> {
        let dense_idx = self.dense_index(entity)?;
        self.sparse[entity.index as usize] = None;

        let last = self.dense.len() - 1;
        if dense_idx != last {
            // Swap-remove: move the last element into the removed slot.
            self.dense.swap(dense_idx, last);
            self.owners.swap(dense_idx, last);
            let moved = self.owners[dense_idx];
            self.sparse[moved.index as usize] = Some(dense_idx);
        }
        self.owners.pop();
        self.dense.pop()
    }

    /// Iterate over all (entity, &component) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.owners.iter().copied().zip(self.dense.iter())
    }
}

impl<T: Component> ComponentStorage for SparseSet<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn take_boxed(&mut self, entity: Entity) -> Option<Box<dyn Any + Send + Sync>> {
        self.take(entity)
            .map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
    }

    fn has(&self, entity: Entity) -> bool {
        self.dense_index(entity).is_some()
    }

    fn len(&self) -> usize {
        self.dense.len()
    }
}

/// Owns every component instance, one sparse set per component type.
///
/// Storages are kept in registration order so that operations touching every type
/// of an entity (destruction, listing) run in a deterministic order.
pub struct ComponentStore {
    storages: Vec<Box<dyn ComponentStorage>>,
    ids: Vec<ComponentId>,
    lookup: HashMap<ComponentId, usize>,
}

impl ComponentStore {
    pub(crate) fn new() -> Self {
        Self {
            storages: Vec::new(),
            ids: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    fn storage<T: Component>(&self) -> Option<&SparseSet<T>> {
        let slot = *self.lookup.get(&ComponentId::of::<T>())?;
        self.storages[slot].as_any().downcast_ref::<SparseSet<T>>()
    }

    fn storage_mut<T: Component>(&mut self) -> &mut SparseSet<T> {
        let id = ComponentId::of::<T>();
        let slot = match self.lookup.get(&id) {
            Some(&slot) => slot,
            None => {
                self.storages.push(Box::new(SparseSet::<T>::new()));
                self.ids.push(id);
                self.lookup.insert(id, self.storages.len() - 1);
                self.storages.len() - 1
            }
        };
        match self.storages[slot].as_any_mut().downcast_mut::<SparseSet<T>>() {
            Some(set) => set,
            None => unreachable!("storage for {id} holds a different type"),
        }
    }

    pub(crate) fn insert<T: Component>(&mut self, entity: Entity, value: T) {
        self.storage_mut::<T>().insert(entity, value);
    }

    pub(crate) fn take<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let slot = *self.lookup.get(&ComponentId::of::<T>())?;
        self.storages[slot]
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()?
            .take(entity)
    }

    pub(crate) fn take_id(
        &mut self,
        id: ComponentId,
        entity: Entity,
    ) -> Option<Box<dyn Any + Send + Sync>> {
        let slot = *self.lookup.get(&id)?;
        self.storages[slot].take_boxed(entity)
    }

    /// Get an immutable reference to a component on an entity.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    /// Get a mutable reference to a component on an entity.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let slot = *self.lookup.get(&ComponentId::of::<T>())?;
        self.storages[slot]
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()?
            .get_mut(entity)
    }

    /// Check whether an entity has a component of the given type.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.has_id(ComponentId::of::<T>(), entity)
    }

    /// Check whether an entity has a component with the given id.
    pub fn has_id(&self, id: ComponentId, entity: Entity) -> bool {
        self.lookup
            .get(&id)
            .is_some_and(|&slot| self.storages[slot].has(entity))
    }

    /// Whether the entity holds every listed component type.
    pub fn has_all(&self, ids: &[ComponentId], entity: Entity) -> bool {
        ids.iter().all(|&id| self.has_id(id, entity))
    }

    /// The component types currently attached to an entity, in registration order.
    pub fn component_ids(&self, entity: Entity) -> Vec<ComponentId> {
        self.ids
            .iter()
            .zip(&self.storages)
            .filter(|(_, storage)| storage.has(entity))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Iterate every stored component of one type.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.storage::<T>().into_iter().flat_map(|set| set.iter())
    }

    /// Total number of component instances across all types.
    pub fn len(&self) -> usize {
        self.storages.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);

    #[test]
    fn insert_and_get() {
        let mut set = SparseSet::new();
        set.insert(Entity::from_raw(5, 0), 42i32);
        assert_eq!(set.get(Entity::from_raw(5, 0)), Some(&42));
        assert_eq!(set.get(Entity::from_raw(0, 0)), None);
    }

    #[test]
    fn stale_generation_misses() {
        let mut set = SparseSet::new();
        set.insert(Entity::from_raw(3, 1), 'x');
        assert_eq!(set.get(Entity::from_raw(3, 0)), None);
        assert_eq!(set.take(Entity::from_raw(3, 0)), None);
        assert_eq!(set.get(Entity::from_raw(3, 1)), Some(&'x'));
    }

    #[test]
    fn take_and_swap() {
        let mut set = SparseSet::new();
        let (a, b, c) = (
            Entity::from_raw(0, 0),
            Entity::from_raw(1, 0),
            Entity::from_raw(2, 0),
        );
        set.insert(a, 'a');
        set.insert(b, 'b');
        set.insert(c, 'c');
        assert_eq!(set.take(a), Some('a'));
        assert_eq!(set.get(a), None);
        assert_eq!(set.get(b), Some(&'b'));
        assert_eq!(set.get(c), Some(&'c'));
        assert_eq!(ComponentStorage::len(&set), 2);
    }

    #[test]
    fn store_lists_ids_in_registration_order() {
        let mut store = ComponentStore::new();
        let e = Entity::from_raw(0, 0);
        store.insert(e, Health(3));
        store.insert(e, 1.5f32);
        assert_eq!(
            store.component_ids(e),
            vec![ComponentId::of::<Health>(), ComponentId::of::<f32>()]
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn take_id_returns_boxed_value() {
        let mut store = ComponentStore::new();
        let e = Entity::from_raw(0, 0);
        store.insert(e, Health(9));
        let boxed = store.take_id(ComponentId::of::<Health>(), e).unwrap();
        assert_eq!(boxed.downcast_ref::<Health>(), Some(&Health(9)));
        assert!(!store.has::<Health>(e));
        assert!(store.take_id(ComponentId::of::<Health>(), e).is_none());
    }

    #[test]
    fn short_name_strips_path() {
        assert_eq!(ComponentId::of::<Health>().short_name(), "Health");
        assert_eq!(ComponentId::of::<u32>().short_name(), "u32");
    }
}
