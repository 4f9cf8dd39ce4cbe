use std::fmt;

/// A generational entity handle: a slot index plus the generation the slot had when
/// the handle was issued. A recycled slot always carries a higher generation, so a
/// stale handle never compares equal to the entity now occupying its slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Entity {
    /// Create an entity from raw parts (mainly for testing).
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index of this entity.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation of this entity (incremented on reuse).
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Allocates and recycles entity slots with generational tracking.
///
/// Retired slots go onto a free list and are handed out again with their generation
/// bumped, which bounds memory under constant spawn/despawn churn.
pub struct EntityStore {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
    len: usize,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Allocate a new entity, reusing a freed slot if available.
    pub fn create(&mut self) -> Entity {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            self.alive[index as usize] = true;
            Entity {
                index,
                generation: self.generations[index as usize],
            }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            Entity {
                index,
                generation: 0,
            }
        }
    }

    /// Retire an entity. Returns `false` if it was already retired or never existed.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let idx = entity.index as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_list.push(entity.index);
        self.len -= 1;
        true
    }

    /// Check if an entity is currently alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index as usize;
        idx < self.alive.len() && self.alive[idx] && self.generations[idx] == entity.generation
    }

    /// All alive entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(index, _)| Entity {
                index: index as u32,
                generation: self.generations[index],
            })
    }

    /// Number of currently alive entities.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of slots ever allocated (alive or free).
    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.generations.len()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_sequential() {
        let mut store = EntityStore::new();
        let e0 = store.create();
        let e1 = store.create();
        assert_eq!(e0.index, 0);
        assert_eq!(e1.index, 1);
        assert_eq!(e0.generation, 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn destroy_and_reuse() {
        let mut store = EntityStore::new();
        let e0 = store.create();
        assert!(store.destroy(e0));
        let e0_reused = store.create();
        assert_eq!(e0_reused.index, 0);
        assert_eq!(e0_reused.generation, 1);
        assert_ne!(e0, e0_reused);
    }

    #[test]
    fn double_destroy_fails() {
        let mut store = EntityStore::new();
        let e = store.create();
        assert!(store.destroy(e));
        assert!(!store.destroy(e));
        assert!(!store.destroy(Entity::from_raw(99, 0)));
    }

    #[test]
    fn stale_handle_cannot_destroy_successor() {
        let mut store = EntityStore::new();
        let old = store.create();
        store.destroy(old);
        let new = store.create();
        assert!(!store.destroy(old));
        assert!(store.is_alive(new));
    }

    #[test]
    fn churn_keeps_slot_count_bounded() {
        let mut store = EntityStore::new();
        let mut seen = Vec::new();
        for _ in 0..100 {
            let e = store.create();
            seen.push(e);
            store.destroy(e);
        }
        assert_eq!(store.capacity(), 1);
        // every generation of slot 0 is distinct
        for (i, a) in seen.iter().enumerate() {
            for b in &seen[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn iter_skips_retired_slots() {
        let mut store = EntityStore::new();
        let a = store.create();
        let b = store.create();
        let c = store.create();
        store.destroy(b);
        assert_eq!(store.iter().collect::<Vec<_>>(), vec![a, c]);
    }
}
