//! Nexus Spatial - bucket index for neighbour queries
//!
//! The grid is rebuilt from scratch once per tick and is immutable afterwards, so a
//! query never observes a half-built index.

mod grid;

pub use grid::{CellCoord, GridConfig, Locatable, SpatialError, SpatialGrid};
