//! Builds the demo's entities

use glam::Vec2;
use nexus_audio::AudioRequests;
use nexus_core::{Color, Position, SimulationConfig};
use nexus_ecs::{ComponentProvider, EcsError, Entity, Nexus};
use rand::Rng;

use crate::components::{
    Boid, BoidState, Collision, DeathThroes, Hazard, Motion, Shape, ShapeKind, Walker,
};

const BOID_RADIUS: f32 = 4.0;
const BOID_SPEED: f32 = 60.0;

/// Creates and destroys demo entities with consistent component sets.
#[derive(Debug, Clone)]
pub struct EntityCreator {
    width: f32,
    height: f32,
    hazard_radius: f32,
    death_duration: f32,
}

impl EntityCreator {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            hazard_radius: config.hazard_radius,
            death_duration: config.death_duration,
        }
    }

    fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        Vec2::new(rng.gen_range(0.0..self.width), rng.gen_range(0.0..self.height))
    }

    /// A coloured dot starting at the centre of the world.
    pub fn create_particle<R: Rng + ?Sized>(
        &self,
        nexus: &mut Nexus,
        rng: &mut R,
    ) -> Result<Entity, EcsError> {
        let particle = nexus.create();
        nexus.attach(
            particle,
            Position::new(self.width * 0.5, self.height * 0.5, 0.0),
        )?;
        nexus.attach(particle, Walker)?;
        nexus.attach(
            particle,
            Shape::new(ShapeKind::Dot, Color::random_visible(rng), 2.0),
        )?;
        Ok(particle)
    }

    /// A boid flying in a random direction. Its alive bundle is swapped for a dying
    /// one when it hits a hazard.
    pub fn create_boid<R: Rng + ?Sized>(
        &self,
        nexus: &mut Nexus,
        rng: &mut R,
    ) -> Result<Entity, EcsError> {
        let boid = nexus.create();
        let heading = rng.gen_range(0.0..std::f32::consts::TAU);
        let collision = ComponentProvider::instance(Collision {
            radius: BOID_RADIUS,
        });

        let fsm = nexus.create_state_machine::<BoidState>(boid)?;
        fsm.create_state(BoidState::Alive)
            .add_type::<Boid>()
            .add_instance(Motion::new(Vec2::from_angle(heading) * BOID_SPEED))
            .add(collision.clone())
            .add_instance(Shape::new(ShapeKind::Arrow, Color::WHITE, BOID_RADIUS));
        fsm.create_state(BoidState::Dying)
            .add(collision)
            .add_instance(DeathThroes::new(self.death_duration))
            .add_instance(Shape::new(
                ShapeKind::Burst,
                Color::from_hex(0xff4040),
                BOID_RADIUS * 2.0,
            ));

        let origin = self.random_point(rng);
        nexus.attach(boid, Position::new(origin.x, origin.y, heading))?;
        nexus.attach(boid, AudioRequests::new())?;
        nexus.change_state(boid, BoidState::Alive)?;
        Ok(boid)
    }

    /// A slowly drifting, spinning hazard.
    pub fn create_hazard<R: Rng + ?Sized>(
        &self,
        nexus: &mut Nexus,
        rng: &mut R,
    ) -> Result<Entity, EcsError> {
        let hazard = nexus.create();
        let origin = self.random_point(rng);
        let drift = Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)) * 10.0;
        nexus.attach(hazard, Position::new(origin.x, origin.y, 0.0))?;
        nexus.attach(
            hazard,
            Motion {
                velocity: drift,
                angular_velocity: rng.gen_range(-1.0..1.0),
                damping: 0.0,
            },
        )?;
        nexus.attach(
            hazard,
            Collision {
                radius: self.hazard_radius,
            },
        )?;
        nexus.attach(hazard, Hazard)?;
        nexus.attach(
            hazard,
            Shape::new(ShapeKind::Ring, Color::from_hex(0xffc020), self.hazard_radius),
        )?;
        Ok(hazard)
    }

    pub fn destroy(&self, nexus: &mut Nexus, entity: Entity) -> Result<(), EcsError> {
        nexus.destroy(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn creator() -> EntityCreator {
        EntityCreator::new(&SimulationConfig::default())
    }

    #[test]
    fn boid_starts_alive_with_its_bundle() {
        let mut nexus = Nexus::new();
        let mut rng = StdRng::seed_from_u64(1);
        let boid = creator().create_boid(&mut nexus, &mut rng).unwrap();

        assert_eq!(nexus.current_state::<BoidState>(boid), Some(BoidState::Alive));
        assert!(nexus.has::<Boid>(boid));
        assert!(nexus.has::<Motion>(boid));
        assert!(nexus.has::<AudioRequests>(boid));
        assert_eq!(nexus.get::<Shape>(boid).unwrap().kind, ShapeKind::Arrow);
    }

    #[test]
    fn dying_boid_keeps_collision_and_loses_motion() {
        let mut nexus = Nexus::new();
        let mut rng = StdRng::seed_from_u64(2);
        let boid = creator().create_boid(&mut nexus, &mut rng).unwrap();
        nexus.get_mut::<Collision>(boid).unwrap().radius = 9.0;

        nexus.change_state(boid, BoidState::Dying).unwrap();
        assert!(!nexus.has::<Boid>(boid));
        assert!(!nexus.has::<Motion>(boid));
        assert_eq!(nexus.get::<Collision>(boid).unwrap().radius, 9.0);
        assert_eq!(nexus.get::<Shape>(boid).unwrap().kind, ShapeKind::Burst);
        assert!(nexus.has::<DeathThroes>(boid));
        assert!(nexus.has::<Position>(boid));
    }

    #[test]
    fn particles_start_in_the_centre() {
        let mut nexus = Nexus::new();
        let mut rng = StdRng::seed_from_u64(3);
        let particle = creator().create_particle(&mut nexus, &mut rng).unwrap();
        let position = nexus.get::<Position>(particle).unwrap();
        assert_eq!(position.position, Vec2::new(400.0, 300.0));
        assert_ne!(nexus.get::<Shape>(particle).unwrap().color, Color::BLACK);
    }
}
