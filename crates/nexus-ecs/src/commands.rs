//! Deferred structural mutations.
//!
//! Systems iterating a family cannot create or destroy entities, attach or detach
//! components, or change states in the middle of the pass. They record a
//! [`Command`] instead, and the queue is applied in recording order once the pass
//! has finished, so the iteration never observes a half-updated member list.

use tracing::warn;

use crate::component::Component;
use crate::entity::Entity;
use crate::error::EcsError;
use crate::state_machine::StateName;
use crate::world::Nexus;

type SpawnFn = Box<dyn FnOnce(&mut Nexus, Entity) -> Result<(), EcsError> + Send>;
type ApplyFn = Box<dyn FnOnce(&mut Nexus) -> Result<(), EcsError> + Send>;

/// A recorded mutation.
pub enum Command {
    /// Create an entity, then let the closure populate it.
    Spawn(SpawnFn),
    /// Destroy an entity and every component it holds.
    Destroy(Entity),
    /// Any other mutation of the context.
    Apply(ApplyFn),
}

/// Ordered queue of [`Command`]s.
#[derive(Default)]
pub struct Commands {
    queue: Vec<Command>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity after the pass and populate it with `build`.
    pub fn spawn<F>(&mut self, build: F)
    where
        F: FnOnce(&mut Nexus, Entity) -> Result<(), EcsError> + Send + 'static,
    {
        self.queue.push(Command::Spawn(Box::new(build)));
    }

    pub fn destroy(&mut self, entity: Entity) {
        self.queue.push(Command::Destroy(entity));
    }

    pub fn attach<T: Component>(&mut self, entity: Entity, component: T) {
        self.push(move |nexus: &mut Nexus| nexus.attach(entity, component));
    }

    pub fn detach<T: Component>(&mut self, entity: Entity) {
        self.push(move |nexus: &mut Nexus| {
            nexus.detach::<T>(entity);
            Ok(())
        });
    }

    pub fn change_state<S: StateName>(&mut self, entity: Entity, state: S) {
        self.push(move |nexus: &mut Nexus| nexus.change_state(entity, state));
    }

    /// Record an arbitrary mutation.
    pub fn push<F>(&mut self, apply: F)
    where
        F: FnOnce(&mut Nexus) -> Result<(), EcsError> + Send + 'static,
    {
        self.queue.push(Command::Apply(Box::new(apply)));
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Apply every command in recording order.
    ///
    /// A failing command does not stop the queue; every command runs and the first
    /// error is returned.
    pub fn apply(self, nexus: &mut Nexus) -> Result<(), EcsError> {
        let mut first_error = None;
        for command in self.queue {
            let result = match command {
                Command::Spawn(build) => {
                    let entity = nexus.create();
                    build(nexus, entity)
                }
                Command::Destroy(entity) => nexus.destroy(entity),
                Command::Apply(apply) => apply(nexus),
            };
            if let Err(e) = result {
                warn!("deferred command failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
