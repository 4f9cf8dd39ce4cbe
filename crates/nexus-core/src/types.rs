//! Core types used throughout the simulation

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Location and heading of an entity in the 2D world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub position: Vec2,
    /// Heading in radians
    pub rotation: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, rotation: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            rotation,
        }
    }

    /// Unit vector the entity is facing
    pub fn forward(&self) -> Vec2 {
        Vec2::from_angle(self.rotation)
    }

    /// Transform an offset expressed in the entity's local frame into world space
    pub fn local_to_world(&self, offset: Vec2) -> Vec2 {
        self.forward().rotate(offset) + self.position
    }

    /// Wrap the position so it stays inside `[0, width] x [0, height]`
    pub fn wrap(&mut self, width: f32, height: f32) {
        if self.position.x < 0.0 {
            self.position.x += width;
        }
        if self.position.x > width {
            self.position.x -= width;
        }
        if self.position.y < 0.0 {
            self.position.y += height;
        }
        if self.position.y > height {
            self.position.y -= height;
        }
    }
}

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from a hex value (0xRRGGBB)
    pub fn from_hex(hex: u32) -> Self {
        Self::rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    /// Random color whose channels are never zero, so it never renders as pure black
    pub fn random_visible<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::rgb(rng.gen_range(1..=255), rng.gen_range(1..=255), rng.gen_range(1..=255))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_local_to_world() {
        let pos = Position::new(10.0, 10.0, std::f32::consts::FRAC_PI_2);
        let world = pos.local_to_world(Vec2::new(8.0, 0.0));
        assert!((world.x - 10.0).abs() < 1e-4);
        assert!((world.y - 18.0).abs() < 1e-4);
    }

    #[test]
    fn test_wrap() {
        let mut pos = Position::new(-5.0, 130.0, 0.0);
        pos.wrap(100.0, 100.0);
        assert_eq!(pos.position, Vec2::new(95.0, 30.0));
    }

    #[test]
    fn test_color_from_hex() {
        assert_eq!(Color::from_hex(0xFF8000), Color::rgb(255, 128, 0));
    }

    #[test]
    fn random_color_is_never_black() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let c = Color::random_visible(&mut rng);
            assert!(c.r > 0 && c.g > 0 && c.b > 0);
        }
    }
}
