//! Nexus - headless entity-component demo
//!
//! Runs random-walk particles, a flock of boids and a few hazards through the
//! nexus, mirroring every drawable entity into a scene tree.

mod components;
mod creator;
mod simulation;
mod systems;

use std::path::PathBuf;

use anyhow::{Context, Result};
use nexus_audio::AudioConfig;
use nexus_core::SimulationConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::simulation::Simulation;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting Nexus demo...");

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => SimulationConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SimulationConfig::load(),
    };
    info!(
        width = config.width,
        height = config.height,
        particles = config.particle_count,
        boids = config.boid_count,
        hazards = config.hazard_count,
        "Loaded configuration"
    );

    let simulation = Simulation::new(config, AudioConfig::default())?;
    simulation.run()?;

    info!("Nexus demo exited cleanly");
    Ok(())
}
