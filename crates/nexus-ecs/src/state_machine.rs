//! Per-entity finite state machines that swap whole component bundles.
//!
//! Each named state is a list of [`ComponentProvider`]s. Changing state detaches what
//! the previous state installed, unless the new state installs the same component
//! through the same provider, and then attaches whatever the new state installs that
//! the entity does not hold yet.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error};

use crate::component::{Component, ComponentId};
use crate::entity::Entity;
use crate::error::EcsError;
use crate::world::Nexus;

/// Types usable as state names, typically a fieldless enum.
pub trait StateName: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T: Copy + Eq + Hash + Debug + Send + Sync + 'static> StateName for T {}

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(0);

/// What makes two providers "the same": components installed by providers with equal
/// keys are left in place across a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ProviderKey {
    Unique(u64),
    Type(ComponentId),
}

impl ProviderKey {
    fn unique() -> Self {
        ProviderKey::Unique(NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type InstallFn = Arc<dyn Fn(&mut Nexus, Entity) -> Result<(), EcsError> + Send + Sync>;

/// Produces the component a state installs.
///
/// Cloning a provider keeps its identity, so adding one provider to two states makes
/// the component persist across transitions between them.
#[derive(Clone)]
pub struct ComponentProvider {
    component: ComponentId,
    key: ProviderKey,
    install: InstallFn,
}

impl ComponentProvider {
    /// Installs a clone of `value`.
    pub fn instance<T: Component + Clone>(value: T) -> Self {
        Self {
            component: ComponentId::of::<T>(),
            key: ProviderKey::unique(),
            install: Arc::new(move |nexus, entity| nexus.attach(entity, value.clone())),
        }
    }

    /// Installs `T::default()`. Every type provider for `T` shares one identity.
    pub fn of_type<T: Component + Default>() -> Self {
        Self {
            component: ComponentId::of::<T>(),
            key: ProviderKey::Type(ComponentId::of::<T>()),
            install: Arc::new(|nexus, entity| nexus.attach(entity, T::default())),
        }
    }

    /// Installs whatever `make` returns at transition time.
    pub fn dynamic<T, F>(make: F) -> Self
    where
        T: Component,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            component: ComponentId::of::<T>(),
            key: ProviderKey::unique(),
            install: Arc::new(move |nexus, entity| nexus.attach(entity, make())),
        }
    }

    pub fn component_id(&self) -> ComponentId {
        self.component
    }

    /// Whether both providers install the same component type with the same identity.
    pub fn is_same_as(&self, other: &ComponentProvider) -> bool {
        self.component == other.component && self.key == other.key
    }
}

impl Debug for ComponentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentProvider")
            .field("component", &self.component)
            .field("key", &self.key)
            .finish()
    }
}

/// The bundle of components one named state installs. At most one provider per
/// component type; adding a second replaces the first.
#[derive(Debug, Clone, Default)]
pub struct EntityState {
    providers: Vec<ComponentProvider>,
}

impl EntityState {
    pub fn add(&mut self, provider: ComponentProvider) -> &mut Self {
        match self
            .providers
            .iter_mut()
            .find(|p| p.component == provider.component)
        {
            Some(existing) => *existing = provider,
            None => self.providers.push(provider),
        }
        self
    }

    pub fn add_instance<T: Component + Clone>(&mut self, value: T) -> &mut Self {
        self.add(ComponentProvider::instance(value))
    }

    pub fn add_type<T: Component + Default>(&mut self) -> &mut Self {
        self.add(ComponentProvider::of_type::<T>())
    }

    pub fn add_dynamic<T, F>(&mut self, make: F) -> &mut Self
    where
        T: Component,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.add(ComponentProvider::dynamic(make))
    }

    pub fn provider(&self, component: ComponentId) -> Option<&ComponentProvider> {
        self.providers.iter().find(|p| p.component == component)
    }

    /// Installed component types, in the order they were added.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.providers.iter().map(|p| p.component)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Named states of one entity and the state currently installed.
///
/// There is no implicit terminal state: an entity that should disappear after its
/// "destroyed" state has played out is removed by whichever system counts that down.
pub struct EntityStateMachine<S: StateName> {
    entity: Entity,
    states: HashMap<S, EntityState>,
    current: Option<S>,
}

impl<S: StateName> EntityStateMachine<S> {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            states: HashMap::new(),
            current: None,
        }
    }

    /// Register (or replace) a state's bundle without installing it.
    pub fn create_state(&mut self, name: S) -> &mut EntityState {
        self.states.insert(name, EntityState::default());
        self.states.entry(name).or_default()
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn current_state(&self) -> Option<S> {
        self.current
    }

    pub fn has_state(&self, name: S) -> bool {
        self.states.contains_key(&name)
    }

    pub fn state(&self, name: S) -> Option<&EntityState> {
        self.states.get(&name)
    }

    /// Swap the entity's components over to the `name` bundle.
    ///
    /// Re-entering the active state does nothing. An unregistered name is an error and
    /// leaves the entity untouched.
    pub fn change_state(&mut self, nexus: &mut Nexus, name: S) -> Result<(), EcsError> {
        if self.current == Some(name) {
            return Ok(());
        }
        if !nexus.is_alive(self.entity) {
            return Err(EcsError::EntityNotAlive(self.entity));
        }
        let Some(next) = self.states.get(&name) else {
            error!(entity = %self.entity, state = ?name, "transition to unregistered state");
            return Err(EcsError::UnknownState {
                entity: self.entity,
                state: format!("{name:?}"),
            });
        };

        if let Some(previous) = self.current.and_then(|current| self.states.get(&current)) {
            for provider in &previous.providers {
                let kept = next
                    .provider(provider.component)
                    .is_some_and(|p| p.is_same_as(provider));
                if !kept {
                    nexus.detach_id(self.entity, provider.component);
                }
            }
        }

        for provider in &next.providers {
            if !nexus.has_id(provider.component, self.entity) {
                (provider.install)(nexus, self.entity)?;
            }
        }

        debug!(entity = %self.entity, from = ?self.current, to = ?name, "state changed");
        self.current = Some(name);
        Ok(())
    }
}

/// Type-erased state machine so the context can own machines of any state type.
pub(crate) trait AnyStateMachine: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: StateName> AnyStateMachine for EntityStateMachine<S> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
