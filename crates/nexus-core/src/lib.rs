//! Nexus Core - Core types and utilities for the Nexus simulation
//!
//! This crate provides the foundational types shared by the other crates:
//! - Mathematical primitives (re-exported from glam)
//! - The `Position` value every spatial system reads
//! - Frame timing with a clamped delta and an FPS report window
//! - Simulation configuration loaded from TOML

pub mod config;
pub mod time;
pub mod types;

pub use config::{ConfigError, SimulationConfig};
pub use glam::Vec2;
pub use time::{FrameStats, GameTime, TimeConfig};
pub use types::{Color, Position};
