//! Simulation configuration with TOML persistence
//!
//! The configuration is read from `<config dir>/nexus/simulation.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::time::TimeConfig;

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything the demo simulation needs to size its world and populations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// World extent along x
    pub width: f32,
    /// World extent along y
    pub height: f32,
    /// Spatial grid cells per axis
    pub grid_resolution: u32,
    /// Random-walk particles created at startup
    pub particle_count: usize,
    /// Flocking boids created at startup
    pub boid_count: usize,
    /// Hazards boids die on contact with
    pub hazard_count: usize,
    /// Contact radius of a hazard
    pub hazard_radius: f32,
    /// Neighbour radius used for flocking
    pub flock_radius: f32,
    /// Random-walk step per tick
    pub walk_speed: f32,
    /// Particles created and destroyed by the churn system each second
    pub churn_per_second: usize,
    /// Seconds a dying boid lingers before it is destroyed
    pub death_duration: f32,
    /// Number of ticks the headless demo runs (0 = until interrupted)
    pub max_ticks: u64,
    /// Fixed random seed; a fresh one is drawn when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub time: TimeConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            grid_resolution: 16,
            particle_count: 2_000,
            boid_count: 300,
            hazard_count: 6,
            hazard_radius: 14.0,
            flock_radius: 30.0,
            walk_speed: 6.0,
            churn_per_second: 100,
            death_duration: 3.0,
            max_ticks: 600,
            seed: None,
            time: TimeConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nexus"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("simulation.toml"))
    }

    /// Load the config from disk, or return defaults if it is missing or broken
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            warn!("Could not determine config directory");
            return Self::default();
        };

        if !path.exists() {
            info!("No simulation config found, using defaults");
            return Self::default();
        }

        match Self::from_file(&path) {
            Ok(config) => {
                info!("Loaded simulation config from {:?}", path);
                config
            }
            Err(e) => {
                warn!("Failed to load simulation config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Read and validate a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "world extent must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.grid_resolution == 0 {
            return Err(ConfigError::Invalid("grid_resolution must be at least 1".into()));
        }
        if self.flock_radius < 0.0 || self.hazard_radius < 0.0 {
            return Err(ConfigError::Invalid("radii must not be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SimulationConfig::from_toml_str("width = 100.0\nboid_count = 3\n").unwrap();
        assert_eq!(config.width, 100.0);
        assert_eq!(config.boid_count, 3);
        assert_eq!(config.height, 600.0);
        assert_eq!(config.time.max_delta_time, 0.05);
    }

    #[test]
    fn nested_time_section() {
        let config =
            SimulationConfig::from_toml_str("[time]\ntime_scale = 0.5\n").unwrap();
        assert_eq!(config.time.time_scale, 0.5);
        assert_eq!(config.time.frame_interval, 0.016);
    }

    #[test]
    fn rejects_zero_resolution() {
        let err = SimulationConfig::from_toml_str("grid_resolution = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn validate_checks_built_configs() {
        assert!(SimulationConfig::default().validate().is_ok());
        let negative = SimulationConfig {
            hazard_radius: -2.0,
            ..Default::default()
        };
        assert!(matches!(negative.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = SimulationConfig::from_toml_str("width = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = SimulationConfig {
            hazard_count: 42,
            ..Default::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = SimulationConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.hazard_count, 42);
        assert_eq!(parsed.seed, None);

        let seeded = SimulationConfig::from_toml_str("seed = 7").unwrap();
        assert_eq!(seeded.seed, Some(7));
    }
}
