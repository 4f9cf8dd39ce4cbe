use crate::component::ComponentId;
use crate::entity::Entity;

/// Caller-side invariant violations reported by the ECS.
///
/// None of these are expected during normal play; they are surfaced as errors
/// instead of panics so the caller decides how loudly to fail. The operation that
/// produced the error has not mutated any state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    #[error("entity {0} is not alive")]
    EntityNotAlive(Entity),

    #[error("component {component} is already attached to entity {entity}")]
    ComponentAlreadyAttached { component: ComponentId, entity: Entity },

    #[error("entity {entity} has no state named '{state}'")]
    UnknownState { entity: Entity, state: String },

    #[error("entity {0} has no state machine of the requested type")]
    NoStateMachine(Entity),

    #[error("entity {0} already has a state machine")]
    StateMachineExists(Entity),
}
