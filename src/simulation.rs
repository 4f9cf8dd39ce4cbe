//! Wires the nexus, its systems, the scene mirror and the audio worker into a
//! headless frame loop.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use nexus_audio::{AudioConfig, AudioDispatcher, LoggingSink};
use nexus_core::{FrameStats, GameTime, SimulationConfig};
use nexus_ecs::{Nexus, SystemSchedule};
use nexus_render::{sync_transforms, Scene, SceneMirror};
use nexus_spatial::GridConfig;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::components::Shape;
use crate::creator::EntityCreator;
use crate::systems::{
    ChurnSystem, DeathThroesSystem, FlockingSystem, HazardSystem, MovementSystem,
    PointerSystem, RandomWalkSystem, SpatialIndexSystem, Tally,
};

pub struct Simulation {
    nexus: Nexus,
    schedule: SystemSchedule,
    audio: AudioDispatcher,
    scene: Arc<Mutex<Scene>>,
    stats: FrameStats,
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(config: SimulationConfig, audio: AudioConfig) -> Result<Self> {
        config.validate().context("Invalid simulation config")?;
        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        info!("Seeding simulation with {}", seed);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut nexus = Nexus::new();
        nexus.insert_resource(GameTime::new(config.time.clone()));
        nexus.insert_resource(Tally::default());

        let scene = Arc::new(Mutex::new(Scene::new()));
        nexus.subscribe(SceneMirror::<Shape>::new(scene.clone()));

        let creator = EntityCreator::new(&config);
        for _ in 0..config.particle_count {
            creator.create_particle(&mut nexus, &mut rng)?;
        }
        for _ in 0..config.boid_count {
            creator.create_boid(&mut nexus, &mut rng)?;
        }
        for _ in 0..config.hazard_count {
            creator.create_hazard(&mut nexus, &mut rng)?;
        }

        let mut schedule = SystemSchedule::new();
        let walk = RandomWalkSystem::new(&mut nexus, &config, StdRng::from_rng(&mut rng)?);
        schedule.add_system(walk);
        let movement = MovementSystem::new(&mut nexus, &config);
        schedule.add_system(movement);
        schedule.add_system(
            SpatialIndexSystem::new(GridConfig::from(&config)).context("Invalid grid")?,
        );
        let flocking = FlockingSystem::new(&mut nexus, &config);
        schedule.add_system(flocking);
        let hazards = HazardSystem::new(&mut nexus);
        schedule.add_system(hazards);
        let pointer = PointerSystem::new(
            &mut nexus,
            scene.clone(),
            &config,
            StdRng::from_rng(&mut rng)?,
        );
        schedule.add_system(pointer);
        let dying = DeathThroesSystem::new(&mut nexus);
        schedule.add_system(dying);
        let churn = ChurnSystem::new(&mut nexus, &config, creator, StdRng::from_rng(&mut rng)?);
        schedule.add_system(churn);

        let audio = AudioDispatcher::new(&mut nexus, LoggingSink, audio)?;

        info!(
            entities = nexus.entity_count(),
            systems = schedule.len(),
            "Simulation ready"
        );

        Ok(Self {
            nexus,
            schedule,
            audio,
            scene,
            stats: FrameStats::default(),
            config,
        })
    }

    pub fn nexus(&self) -> &Nexus {
        &self.nexus
    }

    pub fn scene(&self) -> &Arc<Mutex<Scene>> {
        &self.scene
    }

    /// Advance one frame by `raw_delta` seconds. Returns the number of nodes drawn.
    pub fn tick(&mut self, raw_delta: f32) -> Result<usize> {
        if let Some(time) = self.nexus.resource_mut::<GameTime>() {
            time.update(raw_delta);
        }
        self.schedule.run_all(&mut self.nexus)?;
        self.audio.update(&mut self.nexus)?;

        let mut scene = self.scene.lock();
        sync_transforms(&mut scene, self.nexus.components());
        Ok(scene.draw_list().len())
    }

    /// Run frames at the configured interval until `max_ticks` is reached.
    pub fn run(mut self) -> Result<()> {
        let interval = self.config.time.frame_interval;
        let mut last = Instant::now();
        let mut ticks = 0u64;

        while self.config.max_ticks == 0 || ticks < self.config.max_ticks {
            let start = Instant::now();
            let raw_delta = start.duration_since(last).as_secs_f32().max(interval);
            last = start;

            let drawn = self.tick(raw_delta)?;
            ticks += 1;

            let frame_time = start.elapsed();
            if let Some(time) = self.nexus.resource::<GameTime>() {
                thread::sleep(time.remaining_wait(frame_time));
            }
            if self.stats.record(frame_time, start.elapsed()) {
                self.report(drawn);
            }
        }

        let played = self.audio.shutdown()?;
        info!(ticks, played, "Simulation finished");
        Ok(())
    }

    fn report(&self, drawn: usize) {
        let deaths = self.nexus.resource::<Tally>().map_or(0, |t| t.deaths);
        info!(
            entities = self.nexus.entity_count(),
            components = self.nexus.component_count(),
            families = self.nexus.family_count(),
            fps = self.stats.fps,
            frames = self.stats.total_frames,
            nodes = drawn,
            deaths,
            "tick"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Boid, Walker};

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            width: 200.0,
            height: 200.0,
            grid_resolution: 8,
            particle_count: 50,
            boid_count: 20,
            hazard_count: 2,
            churn_per_second: 10,
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn builds_populations_and_mirrors_them() {
        let sim = Simulation::new(small_config(), AudioConfig::default()).unwrap();
        let nexus = sim.nexus();
        assert_eq!(nexus.entity_count(), 72);
        assert_eq!(nexus.components().iter::<Walker>().count(), 50);
        assert_eq!(nexus.components().iter::<Boid>().count(), 20);
        // one node per entity plus the root
        assert_eq!(sim.scene().lock().len(), 73);
    }

    #[test]
    fn ticks_keep_walker_population_stable() {
        let mut sim = Simulation::new(small_config(), AudioConfig::default()).unwrap();
        for _ in 0..60 {
            sim.tick(0.05).unwrap();
        }
        let nexus = sim.nexus();
        assert_eq!(nexus.components().iter::<Walker>().count(), 50);
        assert!(nexus.resource::<Tally>().unwrap().churned >= 10);
        // every live entity still has exactly one node
        assert_eq!(sim.scene().lock().len(), nexus.entity_count() + 1);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = SimulationConfig {
            flock_radius: -1.0,
            ..small_config()
        };
        assert!(Simulation::new(config, AudioConfig::default()).is_err());
    }

    #[test]
    fn run_stops_after_max_ticks() {
        let config = SimulationConfig {
            max_ticks: 3,
            ..small_config()
        };
        let sim = Simulation::new(config, AudioConfig::default()).unwrap();
        sim.run().unwrap();
    }
}
