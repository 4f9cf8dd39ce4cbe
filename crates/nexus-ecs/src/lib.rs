//! Nexus ECS - Entity Component System
//!
//! Generational entities, sparse-set component storage, and families: member lists
//! kept up to date incrementally as components come and go. Every structural change
//! is announced to subscribed listeners before the call returns. Per-entity state
//! machines swap whole component bundles on transition.

mod commands;
mod component;
mod entity;
mod error;
mod event;
mod family;
mod query;
mod resource;
mod state_machine;
mod system;
mod world;

pub use commands::{Command, Commands};
pub use component::{Component, ComponentId, ComponentStore};
pub use entity::Entity;
pub use error::EcsError;
pub use event::{EventDelegate, ListenerId, Message, NexusEvent, NexusEventListener};
pub use family::FamilyHandle;
pub use query::{Family, FamilyQuery};
pub use state_machine::{ComponentProvider, EntityState, EntityStateMachine, StateName};
pub use system::{System, SystemSchedule};
pub use world::Nexus;
