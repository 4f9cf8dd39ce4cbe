//! Frame timing for the simulation loop
//!
//! Handles the per-tick delta handed to systems and the once-per-second frame report.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for game time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// How many simulated seconds pass per real second
    pub time_scale: f32,
    /// Minimum wall-clock time between two ticks
    pub frame_interval: f32,
    /// Maximum delta time, so a stall (debugger, window drag) does not overshoot
    pub max_delta_time: f32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            frame_interval: 0.016,
            max_delta_time: 0.05,
        }
    }
}

/// Game time tracking
#[derive(Debug, Clone, Default)]
pub struct GameTime {
    /// Configuration
    pub config: TimeConfig,
    /// Time since simulation start in seconds
    pub total_time: f64,
    /// Delta time for this frame (clamped and scaled)
    pub delta_time: f32,
    /// Clamped but unscaled delta time
    pub unscaled_delta_time: f32,
    /// Frame counter
    pub frame_count: u64,
    /// Whether the simulation is paused
    pub paused: bool,
}

impl GameTime {
    /// Create a new game time with custom config
    pub fn new(config: TimeConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Update the game time with the raw delta from the previous frame
    pub fn update(&mut self, raw_delta: f32) {
        self.unscaled_delta_time = raw_delta.clamp(0.0, self.config.max_delta_time);
        self.frame_count += 1;

        if self.paused {
            self.delta_time = 0.0;
            return;
        }

        self.delta_time = self.unscaled_delta_time * self.config.time_scale;
        self.total_time += self.delta_time as f64;
    }

    /// How long the loop should still wait before the next tick may start.
    pub fn remaining_wait(&self, elapsed_since_tick: Duration) -> Duration {
        Duration::from_secs_f32(self.config.frame_interval).saturating_sub(elapsed_since_tick)
    }

    /// Pause the simulation
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Set the time scale (0.0 = frozen, 1.0 = normal, 2.0 = double speed)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.config.time_scale = scale.max(0.0);
    }
}

/// Accumulates frame durations and turns them into an FPS figure once per report window.
#[derive(Debug, Clone)]
pub struct FrameStats {
    window: Duration,
    since_report: Duration,
    frame_times: Vec<Duration>,
    /// Frames counted across all completed windows
    pub total_frames: u64,
    /// FPS computed at the last report, rounded
    pub fps: f64,
}

impl FrameStats {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            since_report: Duration::ZERO,
            frame_times: Vec::new(),
            total_frames: 0,
            fps: 0.0,
        }
    }

    /// Record one frame. Returns `true` when a report window just closed and `fps` was refreshed.
    pub fn record(&mut self, frame_time: Duration, wall_elapsed: Duration) -> bool {
        self.frame_times.push(frame_time);
        self.since_report += wall_elapsed;
        if self.since_report <= self.window {
            return false;
        }

        let count = self.frame_times.len() as u64;
        let sum: Duration = self.frame_times.iter().sum();
        self.frame_times.clear();
        self.total_frames += count;
        self.since_report = Duration::ZERO;

        let average_nanos = sum.as_nanos() as f64 / count as f64;
        self.fps = if average_nanos > 0.0 {
            (1.0 / (average_nanos * 1.0e-9)).round()
        } else {
            0.0
        };
        true
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
