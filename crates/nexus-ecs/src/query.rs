use std::marker::PhantomData;

use crate::component::{Component, ComponentId, ComponentStore};
use crate::entity::Entity;
use crate::family::FamilyHandle;

/// Trait implemented for family parameter types (`&T`, `&mut T`, `Option<&T>`, tuples).
///
/// # Safety
/// Implementors must report every component type they access, and `fetch` must only
/// touch those types.
pub unsafe trait FamilyQuery {
    type Item<'w>;

    /// Component types an entity must hold to be a member.
    fn required() -> Vec<ComponentId>;

    /// Every component type accessed, required or optional.
    fn accessed() -> Vec<ComponentId>;

    /// Fetch the item for an entity.
    ///
    /// # Safety
    /// `store` must be valid for `'w`, no other reference into the accessed storages
    /// may be live, and the accessed types must be pairwise distinct so `&mut`
    /// results never alias.
    unsafe fn fetch<'w>(store: *mut ComponentStore, entity: Entity) -> Option<Self::Item<'w>>;
}

// --- &T ---

unsafe impl<T: Component> FamilyQuery for &T {
    type Item<'w> = &'w T;

    fn required() -> Vec<ComponentId> {
        vec![ComponentId::of::<T>()]
    }

    fn accessed() -> Vec<ComponentId> {
        vec![ComponentId::of::<T>()]
    }

    unsafe fn fetch<'w>(store: *mut ComponentStore, entity: Entity) -> Option<Self::Item<'w>> {
        (*store).get::<T>(entity)
    }
}

// --- &mut T ---

unsafe impl<T: Component> FamilyQuery for &mut T {
    type Item<'w> = &'w mut T;

    fn required() -> Vec<ComponentId> {
        vec![ComponentId::of::<T>()]
    }

    fn accessed() -> Vec<ComponentId> {
        vec![ComponentId::of::<T>()]
    }

    unsafe fn fetch<'w>(store: *mut ComponentStore, entity: Entity) -> Option<Self::Item<'w>> {
        // Each storage lives in its own heap allocation; distinct types never overlap.
        (*store).get_mut::<T>(entity)
    }
}

// --- Option<&T> ---

unsafe impl<T: Component> FamilyQuery for Option<&T> {
    type Item<'w> = Option<&'w T>;

    fn required() -> Vec<ComponentId> {
        vec![]
    }

    fn accessed() -> Vec<ComponentId> {
        vec![ComponentId::of::<T>()]
    }

    unsafe fn fetch<'w>(store: *mut ComponentStore, entity: Entity) -> Option<Self::Item<'w>> {
        Some((*store).get::<T>(entity))
    }
}

// --- Tuple implementations ---

macro_rules! impl_family_query_tuple {
    ($($name:ident),+) => {
        #[allow(non_snake_case)]
        unsafe impl<$($name: FamilyQuery),+> FamilyQuery for ($($name,)+) {
            type Item<'w> = ($($name::Item<'w>,)+);

            fn required() -> Vec<ComponentId> {
                let mut ids = Vec::new();
                $(ids.extend($name::required());)+
                ids
            }

            fn accessed() -> Vec<ComponentId> {
                let mut ids = Vec::new();
                $(ids.extend($name::accessed());)+
                ids
            }

            unsafe fn fetch<'w>(
                store: *mut ComponentStore,
                entity: Entity,
            ) -> Option<Self::Item<'w>> {
                Some(($($name::fetch(store, entity)?,)+))
            }
        }
    };
}

impl_family_query_tuple!(A);
impl_family_query_tuple!(A, B);
impl_family_query_tuple!(A, B, C);
impl_family_query_tuple!(A, B, C, D);
impl_family_query_tuple!(A, B, C, D, E);
impl_family_query_tuple!(A, B, C, D, E, F);
impl_family_query_tuple!(A, B, C, D, E, F, G);
impl_family_query_tuple!(A, B, C, D, E, F, G, H);

/// Whether any component type appears twice in the list.
pub(crate) fn has_duplicates(ids: &[ComponentId]) -> bool {
    ids.iter()
        .enumerate()
        .any(|(i, id)| ids[i + 1..].contains(id))
}

/// Typed handle to a registered family. Obtained from `Nexus::family` and consumed by
/// `Nexus::for_each`, which yields `Q::Item` for every member.
pub struct Family<Q: FamilyQuery> {
    pub(crate) handle: FamilyHandle,
    _marker: PhantomData<fn() -> Q>,
}

impl<Q: FamilyQuery> Family<Q> {
    pub(crate) fn new(handle: FamilyHandle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    /// The untyped handle, for membership queries.
    pub fn handle(&self) -> FamilyHandle {
        self.handle
    }
}

impl<Q: FamilyQuery> Clone for Family<Q> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Q: FamilyQuery> Copy for Family<Q> {}

impl<Q: FamilyQuery> std::fmt::Debug for Family<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Family").field(&self.handle).finish()
    }
}
