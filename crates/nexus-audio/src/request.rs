use std::borrow::Cow;
use std::fmt;

use nexus_ecs::Entity;

/// A named sound asset, e.g. `"explode.wav"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sound(Cow<'static, str>);

impl Sound {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sounds an entity wants played, queued until the next dispatch.
#[derive(Debug, Clone, Default)]
pub struct AudioRequests {
    pending: Vec<Sound>,
}

impl AudioRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&mut self, sound: Sound) {
        self.pending.push(sound);
    }

    pub fn pending(&self) -> &[Sound] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every queued sound, keeping the allocation for the next frame.
    pub fn drain(&mut self) -> impl Iterator<Item = Sound> + '_ {
        self.pending.drain(..)
    }
}

/// One sound handed to the playback worker.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub sound: Sound,
    /// Entity that asked for the sound
    pub source: Entity,
    pub volume: f64,
}
