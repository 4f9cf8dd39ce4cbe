use std::any::Any;
use std::collections::HashMap;

use tracing::{debug, error, warn};

use crate::commands::Commands;
use crate::component::{Component, ComponentId, ComponentStore};
use crate::entity::{Entity, EntityStore};
use crate::error::EcsError;
use crate::event::{EventDelegate, ListenerId, Message, NexusEvent, NexusEventListener};
use crate::family::{FamilyHandle, FamilyIndex};
use crate::query::{has_duplicates, Family, FamilyQuery};
use crate::resource::Resources;
use crate::state_machine::{AnyStateMachine, EntityStateMachine, StateName};

/// The context every system receives. Owns entities, components, families, listeners,
/// state machines and resources.
///
/// Every mutation completes, including family maintenance and listener delivery,
/// before the call returns. Families are updated before external listeners run, so a
/// listener always observes consistent membership.
pub struct Nexus {
    entities: EntityStore,
    components: ComponentStore,
    families: FamilyIndex,
    delegate: EventDelegate,
    state_machines: HashMap<Entity, Box<dyn AnyStateMachine>>,
    resources: Resources,
}

impl Nexus {
    pub fn new() -> Self {
        Self {
            entities: EntityStore::new(),
            components: ComponentStore::new(),
            families: FamilyIndex::new(),
            delegate: EventDelegate::new(),
            state_machines: HashMap::new(),
            resources: Resources::new(),
        }
    }

    fn emit(&mut self, event: NexusEvent) {
        self.delegate.dispatch(&event, &self.components);
    }

    // ---- Entities ----

    pub fn create(&mut self) -> Entity {
        let entity = self.entities.create();
        self.families.entity_created(entity);
        debug!(%entity, "entity created");
        self.emit(NexusEvent::EntityCreated(entity));
        entity
    }

    /// Detach every component (one `ComponentRemoved` each), drop the entity's state
    /// machine, fire `EntityDestroyed` and recycle the slot.
    pub fn destroy(&mut self, entity: Entity) -> Result<(), EcsError> {
        if !self.entities.is_alive(entity) {
            warn!(%entity, "destroy of an entity that is not alive");
            return Err(EcsError::EntityNotAlive(entity));
        }
        for id in self.components.component_ids(entity) {
            self.detach_id(entity, id);
        }
        self.state_machines.remove(&entity);
        self.families.entity_destroyed(entity);
        self.emit(NexusEvent::EntityDestroyed(entity));
        self.entities.destroy(entity);
        debug!(%entity, "entity destroyed");
        Ok(())
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Alive entities in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // ---- Components ----

    /// Attach a component. Fails if the entity is dead or already holds a `T`.
    pub fn attach<T: Component>(&mut self, entity: Entity, component: T) -> Result<(), EcsError> {
        if !self.entities.is_alive(entity) {
            error!(%entity, component = std::any::type_name::<T>(), "attach to dead entity");
            return Err(EcsError::EntityNotAlive(entity));
        }
        let id = ComponentId::of::<T>();
        if self.components.has_id(id, entity) {
            error!(%entity, %id, "component attached twice");
            return Err(EcsError::ComponentAlreadyAttached {
                component: id,
                entity,
            });
        }
        self.components.insert(entity, component);
        self.families.component_added(id, entity, &self.components);
        self.emit(NexusEvent::ComponentAdded {
            component: id,
            entity,
        });
        Ok(())
    }

    /// Detach and return a component. Absence is not an error and fires nothing.
    pub fn detach<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let value = self.components.take::<T>(entity)?;
        self.removed(ComponentId::of::<T>(), entity);
        Some(value)
    }

    /// Untyped detach. Returns the removed value boxed, or `None` if it was absent.
    pub fn detach_id(
        &mut self,
        entity: Entity,
        id: ComponentId,
    ) -> Option<Box<dyn Any + Send + Sync>> {
        let value = self.components.take_id(id, entity)?;
        self.removed(id, entity);
        Some(value)
    }

    fn removed(&mut self, id: ComponentId, entity: Entity) {
        self.families.component_removed(id, entity);
        self.emit(NexusEvent::ComponentRemoved {
            component: id,
            entity,
        });
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.components.get::<T>(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.components.get_mut::<T>(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.components.has::<T>(entity)
    }

    pub fn has_id(&self, id: ComponentId, entity: Entity) -> bool {
        self.components.has_id(id, entity)
    }

    pub fn component_ids(&self, entity: Entity) -> Vec<ComponentId> {
        self.components.component_ids(entity)
    }

    /// Read access to every component, for listeners and reporting.
    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    // ---- Families ----

    /// Register (or look up) the family matching `Q`'s required types.
    ///
    /// # Panics
    /// If `Q` accesses the same component type twice, which would alias `&mut`.
    pub fn family<Q: FamilyQuery>(&mut self) -> Family<Q> {
        assert!(
            !has_duplicates(&Q::accessed()),
            "family query {} accesses a component type twice",
            std::any::type_name::<Q>()
        );
        Family::new(self.register_family(&Q::required()))
    }

    /// Untyped registration by requirement set.
    pub fn register_family(&mut self, required: &[ComponentId]) -> FamilyHandle {
        self.families
            .register(required, &self.entities, &self.components)
    }

    pub fn members(&self, handle: FamilyHandle) -> &[Entity] {
        self.families.members(handle)
    }

    pub fn family_len(&self, handle: FamilyHandle) -> usize {
        self.families.members(handle).len()
    }

    pub fn family_is_empty(&self, handle: FamilyHandle) -> bool {
        self.families.members(handle).is_empty()
    }

    pub fn family_contains(&self, handle: FamilyHandle, entity: Entity) -> bool {
        self.families.contains(handle, entity)
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// Visit every member of `family` in insertion order with its components.
    ///
    /// The pass runs over a snapshot of the member list. Structural changes go through
    /// `commands` and are applied once the pass is over; the first failing command's
    /// error is returned.
    pub fn for_each<Q, F>(&mut self, family: &Family<Q>, mut f: F) -> Result<(), EcsError>
    where
        Q: FamilyQuery,
        F: for<'w> FnMut(Entity, Q::Item<'w>, &mut Commands),
    {
        let members = self.families.members(family.handle).to_vec();
        let mut commands = Commands::new();
        let store: *mut ComponentStore = &mut self.components;
        for entity in members {
            // SAFETY: `family()` rejected queries with repeated types, so the fetched
            // references point into distinct storages. Nothing else borrows the store
            // while the closure runs, and the item does not outlive this iteration.
            if let Some(item) = unsafe { Q::fetch(store, entity) } {
                f(entity, item, &mut commands);
            }
        }
        commands.apply(self)
    }

    // ---- Events ----

    pub fn subscribe<L: NexusEventListener + 'static>(&mut self, listener: L) -> ListenerId {
        self.delegate.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.delegate.unsubscribe(id)
    }

    /// Deliver a pointer message addressed to `entity`.
    pub fn send(&mut self, entity: Entity, message: Message) -> Result<(), EcsError> {
        if !self.entities.is_alive(entity) {
            warn!(%entity, ?message, "message to an entity that is not alive");
            return Err(EcsError::EntityNotAlive(entity));
        }
        self.emit(NexusEvent::Message { entity, message });
        Ok(())
    }

    // ---- State machines ----

    /// Attach an empty state machine to `entity`. States are registered on the
    /// returned machine; nothing is installed until the first `change_state`.
    pub fn create_state_machine<S: StateName>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut EntityStateMachine<S>, EcsError> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::EntityNotAlive(entity));
        }
        if self.state_machines.contains_key(&entity) {
            error!(%entity, "entity already has a state machine");
            return Err(EcsError::StateMachineExists(entity));
        }
        self.state_machines
            .entry(entity)
            .or_insert_with(|| Box::new(EntityStateMachine::<S>::new(entity)))
            .as_any_mut()
            .downcast_mut::<EntityStateMachine<S>>()
            .ok_or(EcsError::NoStateMachine(entity))
    }

    pub fn state_machine<S: StateName>(&self, entity: Entity) -> Option<&EntityStateMachine<S>> {
        self.state_machines
            .get(&entity)?
            .as_any()
            .downcast_ref::<EntityStateMachine<S>>()
    }

    pub fn state_machine_mut<S: StateName>(
        &mut self,
        entity: Entity,
    ) -> Option<&mut EntityStateMachine<S>> {
        self.state_machines
            .get_mut(&entity)?
            .as_any_mut()
            .downcast_mut::<EntityStateMachine<S>>()
    }

    /// Transition the entity's state machine. See [`EntityStateMachine::change_state`].
    pub fn change_state<S: StateName>(&mut self, entity: Entity, state: S) -> Result<(), EcsError> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::EntityNotAlive(entity));
        }
        // Taken out for the duration so the machine can mutate the context.
        let mut machine = self
            .state_machines
            .remove(&entity)
            .ok_or(EcsError::NoStateMachine(entity))?;
        let result = match machine
            .as_any_mut()
            .downcast_mut::<EntityStateMachine<S>>()
        {
            Some(machine) => machine.change_state(self, state),
            None => Err(EcsError::NoStateMachine(entity)),
        };
        self.state_machines.insert(entity, machine);
        result
    }

    pub fn current_state<S: StateName>(&self, entity: Entity) -> Option<S> {
        self.state_machine::<S>(entity)?.current_state()
    }

    // ---- Resources ----

    pub fn insert_resource<T: 'static + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.resources.insert(value)
    }

    pub fn resource<T: 'static + Send + Sync>(&self) -> Option<&T> {
        self.resources.get::<T>()
    }

    pub fn resource_mut<T: 'static + Send + Sync>(&mut self) -> Option<&mut T> {
        self.resources.get_mut::<T>()
    }

    pub fn remove_resource<T: 'static + Send + Sync>(&mut self) -> Option<T> {
        self.resources.remove::<T>()
    }
}

impl Default for Nexus {
    fn default() -> Self {
        Self::new()
    }
}
