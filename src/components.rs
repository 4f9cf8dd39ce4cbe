//! Components used by the demo simulation

use glam::Vec2;
use nexus_core::Color;
use nexus_render::{SceneNode, Visual};

/// Linear and angular velocity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Motion {
    pub velocity: Vec2,
    /// Radians per second
    pub angular_velocity: f32,
    /// Speed lost per second
    pub damping: f32,
}

impl Motion {
    pub fn new(velocity: Vec2) -> Self {
        Self {
            velocity,
            ..Default::default()
        }
    }
}

/// Contact radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    pub radius: f32,
}

/// Particle that wanders randomly
#[derive(Debug, Clone, Copy, Default)]
pub struct Walker;

/// Flocking member; present only while the boid is alive
#[derive(Debug, Clone, Copy, Default)]
pub struct Boid;

/// Kills boids on contact
#[derive(Debug, Clone, Copy, Default)]
pub struct Hazard;

/// Seconds left before a dying entity is removed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeathThroes {
    pub countdown: f32,
}

impl DeathThroes {
    pub fn new(duration: f32) -> Self {
        Self {
            countdown: duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoidState {
    Alive,
    Dying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Dot,
    Arrow,
    Burst,
    Ring,
}

/// How an entity is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub color: Color,
    pub size: f32,
}

impl Shape {
    pub fn new(kind: ShapeKind, color: Color, size: f32) -> Self {
        Self { kind, color, size }
    }
}

impl Visual for Shape {
    fn apply(&self, node: &mut SceneNode) {
        node.color = self.color;
        node.scale = Vec2::splat(self.size);
    }
}
