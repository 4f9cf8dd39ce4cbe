use serde::{Deserialize, Serialize};

/// Volume and queue settings for sound playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Master volume multiplier (0.0–1.0).
    pub master_volume: f64,
    /// Sound effects volume multiplier (0.0–1.0).
    pub sfx_volume: f64,
    /// Requests that may wait for the worker before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            sfx_volume: 1.0,
            queue_capacity: 256,
        }
    }
}

impl AudioConfig {
    /// Effective SFX volume (master * sfx), clamped to 0.0–1.0.
    pub fn effective_sfx_volume(&self) -> f64 {
        (self.master_volume * self.sfx_volume).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_volumes() {
        let config = AudioConfig::default();
        assert_eq!(config.effective_sfx_volume(), 1.0);
        assert_eq!(config.queue_capacity, 256);
    }

    #[test]
    fn effective_volume_is_clamped() {
        let config = AudioConfig {
            master_volume: 0.5,
            sfx_volume: 0.5,
            ..Default::default()
        };
        assert_eq!(config.effective_sfx_volume(), 0.25);

        let loud = AudioConfig {
            master_volume: 2.0,
            sfx_volume: 1.0,
            ..Default::default()
        };
        assert_eq!(loud.effective_sfx_volume(), 1.0);
    }
}
