//! Nexus Audio - sound requests raised by systems, played off the main thread
//!
//! Systems push [`Sound`]s onto an entity's [`AudioRequests`] component. Once per
//! frame [`AudioDispatcher::update`] drains every queue and hands the requests to a
//! worker thread that owns the [`SoundSink`]. The worker never touches the ECS.

mod config;
mod dispatcher;
mod error;
mod request;

pub use config::AudioConfig;
pub use dispatcher::{AudioDispatcher, LoggingSink, SoundSink};
pub use error::AudioError;
pub use request::{AudioRequests, PlayRequest, Sound};
