//! Lifecycle events and the delegate that fans them out to listeners.

use glam::Vec2;
use tracing::trace;

use crate::component::{ComponentId, ComponentStore};
use crate::entity::Entity;

/// Pointer input routed to a specific entity. Replaces per-entity click callbacks:
/// whoever owns the entity's behaviour listens for the message instead of holding a
/// closure that captures the entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    MouseDown { position: Vec2, time: f64 },
    MouseUp { position: Vec2, time: f64 },
    Click { position: Vec2 },
}

/// Something that happened to the entity/component store.
///
/// Events carry the component *type* tag, never the value; listeners match on the
/// tag and read the value through the [`ComponentStore`] they are handed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NexusEvent {
    EntityCreated(Entity),
    EntityDestroyed(Entity),
    ComponentAdded { component: ComponentId, entity: Entity },
    ComponentRemoved { component: ComponentId, entity: Entity },
    Message { entity: Entity, message: Message },
}

impl NexusEvent {
    /// The entity the event concerns.
    pub fn entity(&self) -> Entity {
        match *self {
            NexusEvent::EntityCreated(entity)
            | NexusEvent::EntityDestroyed(entity)
            | NexusEvent::ComponentAdded { entity, .. }
            | NexusEvent::ComponentRemoved { entity, .. }
            | NexusEvent::Message { entity, .. } => entity,
        }
    }
}

/// Receives every [`NexusEvent`] synchronously, before the mutating call returns.
///
/// `components` reflects the store *after* the mutation: on `ComponentAdded` the new
/// value is readable, on `ComponentRemoved` it is already gone. A listener that needs
/// the last value of a removed component must keep its own copy from the add.
pub trait NexusEventListener: Send + Sync {
    fn on_event(&mut self, event: &NexusEvent, components: &ComponentStore);
}

/// Closures can be subscribed directly.
impl<F> NexusEventListener for F
where
    F: FnMut(&NexusEvent, &ComponentStore) + Send + Sync,
{
    fn on_event(&mut self, event: &NexusEvent, components: &ComponentStore) {
        (self)(event, components);
    }
}

/// Handle returned by [`EventDelegate::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Dispatch point for lifecycle events. Listeners are called in subscription order.
pub struct EventDelegate {
    listeners: Vec<(ListenerId, Box<dyn NexusEventListener>)>,
    next_id: u64,
}

impl EventDelegate {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe<L: NexusEventListener + 'static>(&mut self, listener: L) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn dispatch(&mut self, event: &NexusEvent, components: &ComponentStore) {
        trace!(?event, listeners = self.listeners.len(), "dispatch");
        for (_, listener) in &mut self.listeners {
            listener.on_event(event, components);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl Default for EventDelegate {
    fn default() -> Self {
        Self::new()
    }
}
