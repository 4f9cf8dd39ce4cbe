//! Per-tick behaviour of the demo, run in a fixed order by the schedule

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec2;
use nexus_audio::{AudioRequests, Sound};
use nexus_core::{GameTime, Position, SimulationConfig};
use nexus_ecs::{
    ComponentStore, EcsError, Entity, Family, Message, Nexus, NexusEvent, System,
};
use nexus_render::Scene;
use nexus_spatial::{GridConfig, SpatialError, SpatialGrid};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, warn};

use crate::components::{Boid, BoidState, Collision, DeathThroes, Hazard, Motion, Walker};
use crate::creator::EntityCreator;

const EXPLODE: Sound = Sound::from_static("explode.wav");
const MIN_BOID_SPEED: f32 = 30.0;
const MAX_BOID_SPEED: f32 = 90.0;

/// Running totals shown in the periodic report
#[derive(Debug, Clone, Default)]
pub struct Tally {
    pub deaths: u64,
    pub removed: u64,
    pub churned: u64,
    pub clicks: u64,
}

/// This tick's spatial index over every positioned entity
#[derive(Clone)]
pub struct WorldGrid(pub Arc<SpatialGrid<Entity>>);

fn delta_time(nexus: &Nexus) -> f32 {
    nexus.resource::<GameTime>().map_or(0.0, |time| time.delta_time)
}

fn tally(nexus: &mut Nexus) -> Option<&mut Tally> {
    nexus.resource_mut::<Tally>()
}

/// Reflect a coordinate back into `[0, extent]`.
fn reflect(value: f32, extent: f32) -> f32 {
    if value < 0.0 {
        (-value).min(extent)
    } else if value > extent {
        (2.0 * extent - value).max(0.0)
    } else {
        value
    }
}

/// Jitters every walker by up to `walk_speed` per tick, bouncing off the edges.
pub struct RandomWalkSystem {
    walkers: Family<(&'static mut Position, &'static Walker)>,
    rng: StdRng,
    speed: f32,
    extent: Vec2,
}

impl RandomWalkSystem {
    pub fn new(nexus: &mut Nexus, config: &SimulationConfig, rng: StdRng) -> Self {
        Self {
            walkers: nexus.family(),
            rng,
            speed: config.walk_speed,
            extent: Vec2::new(config.width, config.height),
        }
    }
}

impl System for RandomWalkSystem {
    fn run(&mut self, nexus: &mut Nexus) -> Result<(), EcsError> {
        let (rng, speed, extent) = (&mut self.rng, self.speed, self.extent);
        nexus.for_each(&self.walkers, |_, (position, _), _| {
            let step = Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0)) * speed;
            let next = position.position + step;
            position.position = Vec2::new(reflect(next.x, extent.x), reflect(next.y, extent.y));
        })
    }

    fn name(&self) -> &str {
        "random_walk"
    }
}

/// Integrates velocity and spin, applies damping, and wraps around the world.
pub struct MovementSystem {
    movers: Family<(&'static mut Position, &'static mut Motion)>,
    extent: Vec2,
}

impl MovementSystem {
    pub fn new(nexus: &mut Nexus, config: &SimulationConfig) -> Self {
        Self {
            movers: nexus.family(),
            extent: Vec2::new(config.width, config.height),
        }
    }
}

impl System for MovementSystem {
    fn run(&mut self, nexus: &mut Nexus) -> Result<(), EcsError> {
        let dt = delta_time(nexus);
        let extent = self.extent;
        nexus.for_each(&self.movers, |_, (position, motion), _| {
            position.position += motion.velocity * dt;
            position.rotation += motion.angular_velocity * dt;
            position.wrap(extent.x, extent.y);
            if motion.damping > 0.0 {
                let speed = motion.velocity.length();
                if speed > 0.0 {
                    let damped = (speed - motion.damping * dt).max(0.0);
                    motion.velocity *= damped / speed;
                }
            }
        })
    }

    fn name(&self) -> &str {
        "movement"
    }
}

/// Rebuilds the [`WorldGrid`] resource from scratch.
pub struct SpatialIndexSystem {
    config: GridConfig,
}

impl SpatialIndexSystem {
    pub fn new(config: GridConfig) -> Result<Self, SpatialError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl System for SpatialIndexSystem {
    fn run(&mut self, nexus: &mut Nexus) -> Result<(), EcsError> {
        match SpatialGrid::from_nexus(nexus, self.config) {
            Ok(grid) => {
                nexus.insert_resource(WorldGrid(Arc::new(grid)));
            }
            Err(e) => warn!("Spatial index not rebuilt: {}", e),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "spatial_index"
    }
}

/// Steers live boids towards their neighbours' centre and heading while keeping
/// them apart.
///
/// Neighbours come from the query point's own grid cell only. Boids near a cell
/// border see fewer flockmates than they could; flocking tolerates that and the
/// lookup stays a single bucket.
pub struct FlockingSystem {
    boids: Family<(&'static Position, &'static mut Motion, &'static Boid)>,
    radius: f32,
}

impl FlockingSystem {
    pub fn new(nexus: &mut Nexus, config: &SimulationConfig) -> Self {
        Self {
            boids: nexus.family(),
            radius: config.flock_radius,
        }
    }
}

fn steer(
    position: Vec2,
    velocity: Vec2,
    neighbours: &[(Vec2, Vec2)],
    radius: f32,
) -> Vec2 {
    if neighbours.is_empty() {
        return Vec2::ZERO;
    }
    let count = neighbours.len() as f32;
    let centre = neighbours.iter().map(|(p, _)| *p).sum::<Vec2>() / count;
    let heading = neighbours.iter().map(|(_, v)| *v).sum::<Vec2>() / count;
    let separation: Vec2 = neighbours
        .iter()
        .filter(|(p, _)| p.distance(position) < radius * 0.5)
        .map(|(p, _)| (position - *p).normalize_or_zero() * radius)
        .sum();
    (centre - position) * 0.5 + (heading - velocity) * 0.3 + separation
}

impl System for FlockingSystem {
    fn run(&mut self, nexus: &mut Nexus) -> Result<(), EcsError> {
        let Some(WorldGrid(grid)) = nexus.resource::<WorldGrid>().cloned() else {
            return Ok(());
        };
        let dt = delta_time(nexus);
        let radius = self.radius;
        let velocities: HashMap<Entity, Vec2> = nexus
            .members(self.boids.handle())
            .iter()
            .filter_map(|&e| nexus.get::<Motion>(e).map(|m| (e, m.velocity)))
            .collect();

        let mut neighbours = Vec::new();
        nexus.for_each(&self.boids, |entity, (position, motion, _), _| {
            neighbours.clear();
            neighbours.extend(
                grid.query_cell(position.position, radius)
                    .filter(|(other, _)| *other != entity)
                    .filter_map(|(other, at)| velocities.get(&other).map(|v| (at, *v))),
            );
            let acceleration = steer(position.position, motion.velocity, &neighbours, radius);
            let velocity = motion.velocity + acceleration * dt;
            if velocity.length_squared() > f32::EPSILON {
                motion.velocity = velocity.clamp_length(MIN_BOID_SPEED, MAX_BOID_SPEED);
            }
        })
    }

    fn name(&self) -> &str {
        "flocking"
    }
}

/// Switches every live boid touching a hazard into its dying state.
///
/// Contacts are found with the admissible ring query: a hit must never be missed
/// because the boid sits in the next cell. The search reaches as far as the
/// largest live boid's collision radius.
pub struct HazardSystem {
    hazards: Family<(&'static Position, &'static Collision, &'static Hazard)>,
    boids: Family<(&'static Collision, &'static Boid)>,
}

impl HazardSystem {
    pub fn new(nexus: &mut Nexus) -> Self {
        Self {
            hazards: nexus.family(),
            boids: nexus.family(),
        }
    }

    fn largest_boid_radius(&self, nexus: &Nexus) -> f32 {
        nexus
            .members(self.boids.handle())
            .iter()
            .filter_map(|&boid| nexus.get::<Collision>(boid))
            .fold(0.0_f32, |largest, collision| largest.max(collision.radius))
    }
}

impl System for HazardSystem {
    fn run(&mut self, nexus: &mut Nexus) -> Result<(), EcsError> {
        let Some(WorldGrid(grid)) = nexus.resource::<WorldGrid>().cloned() else {
            return Ok(());
        };

        let boid_radius = self.largest_boid_radius(nexus);
        let mut victims = Vec::new();
        for &hazard in nexus.members(self.hazards.handle()) {
            let (Some(position), Some(collision)) = (
                nexus.get::<Position>(hazard),
                nexus.get::<Collision>(hazard),
            ) else {
                continue;
            };
            for (entity, at) in grid.query_within(position.position, collision.radius + boid_radius) {
                if !nexus.has::<Boid>(entity) {
                    continue;
                }
                let reach = collision.radius
                    + nexus.get::<Collision>(entity).map_or(0.0, |c| c.radius);
                if at.distance(position.position) <= reach {
                    victims.push(entity);
                }
            }
        }
        victims.sort();
        victims.dedup();

        for &victim in &victims {
            nexus.change_state(victim, BoidState::Dying)?;
            if let Some(audio) = nexus.get_mut::<AudioRequests>(victim) {
                audio.play(EXPLODE);
            }
        }
        if let Some(tally) = tally(nexus) {
            tally.deaths += victims.len() as u64;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "hazard"
    }
}

/// Counts down dying entities and destroys them when the countdown runs out.
pub struct DeathThroesSystem {
    dying: Family<&'static mut DeathThroes>,
}

impl DeathThroesSystem {
    pub fn new(nexus: &mut Nexus) -> Self {
        Self {
            dying: nexus.family(),
        }
    }
}

impl System for DeathThroesSystem {
    fn run(&mut self, nexus: &mut Nexus) -> Result<(), EcsError> {
        let dt = delta_time(nexus);
        let mut removed = 0;
        nexus.for_each(&self.dying, |entity, death, commands| {
            death.countdown -= dt;
            if death.countdown <= 0.0 {
                commands.destroy(entity);
                removed += 1;
            }
        })?;
        if let Some(tally) = tally(nexus) {
            tally.removed += removed;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "death_throes"
    }
}

/// Once per simulated second, destroys the oldest walkers and creates as many new
/// ones.
pub struct ChurnSystem {
    walkers: Family<&'static Walker>,
    creator: EntityCreator,
    rng: StdRng,
    per_second: usize,
    elapsed: f32,
}

impl ChurnSystem {
    pub fn new(
        nexus: &mut Nexus,
        config: &SimulationConfig,
        creator: EntityCreator,
        rng: StdRng,
    ) -> Self {
        Self {
            walkers: nexus.family(),
            creator,
            rng,
            per_second: config.churn_per_second,
            elapsed: 0.0,
        }
    }
}

impl System for ChurnSystem {
    fn run(&mut self, nexus: &mut Nexus) -> Result<(), EcsError> {
        self.elapsed += delta_time(nexus);
        while self.elapsed >= 1.0 {
            self.elapsed -= 1.0;
            let doomed: Vec<Entity> = nexus
                .members(self.walkers.handle())
                .iter()
                .take(self.per_second)
                .copied()
                .collect();
            for &entity in &doomed {
                self.creator.destroy(nexus, entity)?;
            }
            for _ in 0..doomed.len() {
                self.creator.create_particle(nexus, &mut self.rng)?;
            }
            debug!(count = doomed.len(), "walkers churned");
            if let Some(tally) = tally(nexus) {
                tally.churned += doomed.len() as u64;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "churn"
    }
}

/// Collects pointer messages delivered through the event delegate.
#[derive(Clone, Default)]
pub struct Inbox(Arc<Mutex<Vec<(Entity, Message)>>>);

impl Inbox {
    /// Listener that files every message into this inbox.
    pub fn listener(&self) -> impl FnMut(&NexusEvent, &ComponentStore) + Send + Sync + 'static {
        let inbox = self.0.clone();
        move |event: &NexusEvent, _: &ComponentStore| {
            if let NexusEvent::Message { entity, message } = *event {
                inbox.lock().push((entity, message));
            }
        }
    }

    pub fn take(&self) -> Vec<(Entity, Message)> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// Stands in for a user: once per simulated second it clicks a random spot. The
/// click goes to whichever entity is drawn there, and a clicked boid dies.
pub struct PointerSystem {
    scene: Arc<Mutex<Scene>>,
    inbox: Inbox,
    rng: StdRng,
    extent: Vec2,
    elapsed: f32,
}

const PICK_RADIUS: f32 = 12.0;

impl PointerSystem {
    pub fn new(
        nexus: &mut Nexus,
        scene: Arc<Mutex<Scene>>,
        config: &SimulationConfig,
        rng: StdRng,
    ) -> Self {
        let inbox = Inbox::default();
        nexus.subscribe(inbox.listener());
        Self {
            scene,
            inbox,
            rng,
            extent: Vec2::new(config.width, config.height),
            elapsed: 0.0,
        }
    }

    fn click(&mut self, nexus: &mut Nexus) -> Result<(), EcsError> {
        let point = Vec2::new(
            self.rng.gen_range(0.0..self.extent.x),
            self.rng.gen_range(0.0..self.extent.y),
        );
        let Some(target) = self.scene.lock().pick(point, PICK_RADIUS) else {
            return Ok(());
        };
        let time = nexus.resource::<GameTime>().map_or(0.0, |t| t.total_time);
        nexus.send(target, Message::MouseDown { position: point, time })?;
        nexus.send(target, Message::MouseUp { position: point, time })?;
        nexus.send(target, Message::Click { position: point })
    }
}

impl System for PointerSystem {
    fn run(&mut self, nexus: &mut Nexus) -> Result<(), EcsError> {
        self.elapsed += delta_time(nexus);
        if self.elapsed >= 1.0 {
            self.elapsed -= 1.0;
            self.click(nexus)?;
        }

        for (entity, message) in self.inbox.take() {
            if !matches!(message, Message::Click { .. }) || !nexus.has::<Boid>(entity) {
                continue;
            }
            nexus.change_state(entity, BoidState::Dying)?;
            if let Some(audio) = nexus.get_mut::<AudioRequests>(entity) {
                audio.play(EXPLODE);
            }
            if let Some(tally) = tally(nexus) {
                tally.clicks += 1;
                tally.deaths += 1;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "pointer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::TimeConfig;
    use rand::SeedableRng;

    fn nexus_with_time(dt: f32) -> Nexus {
        let mut nexus = Nexus::new();
        let mut time = GameTime::new(TimeConfig::default());
        time.update(dt);
        nexus.insert_resource(time);
        nexus.insert_resource(Tally::default());
        nexus
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            width: 100.0,
            height: 100.0,
            grid_resolution: 4,
            ..Default::default()
        }
    }

    #[test]
    fn reflect_keeps_values_inside() {
        assert_eq!(reflect(-3.0, 10.0), 3.0);
        assert_eq!(reflect(12.0, 10.0), 8.0);
        assert_eq!(reflect(5.0, 10.0), 5.0);
    }

    #[test]
    fn random_walk_stays_in_bounds() {
        let mut nexus = nexus_with_time(0.016);
        let config = config();
        let creator = EntityCreator::new(&config);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            creator.create_particle(&mut nexus, &mut rng).unwrap();
        }
        let mut walk = RandomWalkSystem::new(&mut nexus, &config, StdRng::seed_from_u64(12));
        for _ in 0..200 {
            walk.run(&mut nexus).unwrap();
        }
        for (_, position) in nexus.components().iter::<Position>() {
            assert!((0.0..=100.0).contains(&position.position.x));
            assert!((0.0..=100.0).contains(&position.position.y));
        }
    }

    #[test]
    fn hazard_kills_boid_across_cell_border() {
        let mut nexus = nexus_with_time(0.016);
        let config = config();
        let creator = EntityCreator::new(&config);
        let mut rng = StdRng::seed_from_u64(5);
        let boid = creator.create_boid(&mut nexus, &mut rng).unwrap();
        let hazard = creator.create_hazard(&mut nexus, &mut rng).unwrap();
        // cells are 25 wide: the boid sits one cell to the right of the hazard
        nexus.get_mut::<Position>(hazard).unwrap().position = Vec2::new(20.0, 10.0);
        nexus.get_mut::<Position>(boid).unwrap().position = Vec2::new(30.0, 10.0);

        SpatialIndexSystem::new(GridConfig::from(&config))
            .unwrap()
            .run(&mut nexus)
            .unwrap();
        HazardSystem::new(&mut nexus).run(&mut nexus).unwrap();

        assert_eq!(nexus.current_state::<BoidState>(boid), Some(BoidState::Dying));
        assert_eq!(nexus.get::<AudioRequests>(boid).unwrap().pending(), &[EXPLODE]);
        assert_eq!(nexus.resource::<Tally>().unwrap().deaths, 1);
    }

    #[test]
    fn hazard_reaches_boids_with_a_wide_collision_radius() {
        let mut nexus = nexus_with_time(0.016);
        let config = config();
        let creator = EntityCreator::new(&config);
        let mut rng = StdRng::seed_from_u64(6);
        let boid = creator.create_boid(&mut nexus, &mut rng).unwrap();
        let hazard = creator.create_hazard(&mut nexus, &mut rng).unwrap();
        nexus.get_mut::<Position>(hazard).unwrap().position = Vec2::new(50.0, 50.0);
        nexus.get_mut::<Position>(boid).unwrap().position = Vec2::new(70.0, 50.0);
        // 20 apart: out of reach for a default boid, touching at radius 9
        nexus.get_mut::<Collision>(boid).unwrap().radius = 9.0;

        SpatialIndexSystem::new(GridConfig::from(&config))
            .unwrap()
            .run(&mut nexus)
            .unwrap();
        HazardSystem::new(&mut nexus).run(&mut nexus).unwrap();

        assert_eq!(nexus.current_state::<BoidState>(boid), Some(BoidState::Dying));
    }

    #[test]
    fn hazard_spares_boids_out_of_reach() {
        let mut nexus = nexus_with_time(0.016);
        let config = config();
        let creator = EntityCreator::new(&config);
        let mut rng = StdRng::seed_from_u64(7);
        let boid = creator.create_boid(&mut nexus, &mut rng).unwrap();
        let hazard = creator.create_hazard(&mut nexus, &mut rng).unwrap();
        nexus.get_mut::<Position>(hazard).unwrap().position = Vec2::new(50.0, 50.0);
        nexus.get_mut::<Position>(boid).unwrap().position = Vec2::new(70.0, 50.0);

        SpatialIndexSystem::new(GridConfig::from(&config))
            .unwrap()
            .run(&mut nexus)
            .unwrap();
        HazardSystem::new(&mut nexus).run(&mut nexus).unwrap();

        assert_eq!(nexus.current_state::<BoidState>(boid), Some(BoidState::Alive));
        assert_eq!(nexus.resource::<Tally>().unwrap().deaths, 0);
    }

    #[test]
    fn death_throes_destroy_after_countdown() {
        let mut nexus = nexus_with_time(0.05);
        let e = nexus.create();
        nexus.attach(e, DeathThroes::new(0.08)).unwrap();
        let mut system = DeathThroesSystem::new(&mut nexus);

        system.run(&mut nexus).unwrap();
        assert!(nexus.is_alive(e));
        system.run(&mut nexus).unwrap();
        assert!(!nexus.is_alive(e));
        assert_eq!(nexus.resource::<Tally>().unwrap().removed, 1);
    }

    #[test]
    fn churn_replaces_oldest_walkers() {
        let mut nexus = nexus_with_time(0.05);
        let config = SimulationConfig {
            churn_per_second: 3,
            ..config()
        };
        let creator = EntityCreator::new(&config);
        let mut rng = StdRng::seed_from_u64(9);
        let first: Vec<Entity> = (0..5)
            .map(|_| creator.create_particle(&mut nexus, &mut rng).unwrap())
            .collect();
        let mut churn = ChurnSystem::new(&mut nexus, &config, creator, StdRng::seed_from_u64(10));

        for _ in 0..19 {
            churn.run(&mut nexus).unwrap();
        }
        assert_eq!(nexus.resource::<Tally>().unwrap().churned, 0);
        churn.run(&mut nexus).unwrap();
        churn.run(&mut nexus).unwrap();

        assert_eq!(nexus.entity_count(), 5);
        assert!(first[..3].iter().all(|&e| !nexus.is_alive(e)));
        assert!(first[3..].iter().all(|&e| nexus.is_alive(e)));
        assert_eq!(nexus.resource::<Tally>().unwrap().churned, 3);
    }

    #[test]
    fn movement_wraps_around_the_world() {
        let mut nexus = nexus_with_time(0.05);
        let e = nexus.create();
        nexus.attach(e, Position::new(99.0, 50.0, 0.0)).unwrap();
        nexus.attach(e, Motion::new(Vec2::new(100.0, 0.0))).unwrap();
        MovementSystem::new(&mut nexus, &config()).run(&mut nexus).unwrap();
        let position = nexus.get::<Position>(e).unwrap().position;
        assert!((position.x - 4.0).abs() < 1e-4);
    }

    #[test]
    fn clicked_boid_dies() {
        let mut nexus = nexus_with_time(0.016);
        let config = config();
        let scene = Arc::new(Mutex::new(Scene::new()));
        nexus.subscribe(nexus_render::SceneMirror::<crate::components::Shape>::new(
            scene.clone(),
        ));
        let creator = EntityCreator::new(&config);
        let boid = creator
            .create_boid(&mut nexus, &mut StdRng::seed_from_u64(4))
            .unwrap();
        let mut pointer =
            PointerSystem::new(&mut nexus, scene, &config, StdRng::seed_from_u64(3));

        nexus
            .send(boid, Message::Click { position: Vec2::ZERO })
            .unwrap();
        pointer.run(&mut nexus).unwrap();

        assert_eq!(nexus.current_state::<BoidState>(boid), Some(BoidState::Dying));
        assert_eq!(nexus.resource::<Tally>().unwrap().clicks, 1);
    }
}
