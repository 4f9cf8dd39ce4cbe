//! Uniform bucket grid over a rectangular world.

use glam::Vec2;
use nexus_core::{Position, SimulationConfig};
use nexus_ecs::{Entity, Nexus};
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpatialError {
    #[error("grid resolution must be at least 1")]
    ZeroResolution,

    #[error("grid extent must be positive and finite, got {width}x{height}")]
    InvalidExtent { width: f32, height: f32 },
}

/// Anything with a point in world space.
pub trait Locatable {
    fn location(&self) -> Vec2;
}

impl Locatable for Vec2 {
    fn location(&self) -> Vec2 {
        *self
    }
}

impl Locatable for Position {
    fn location(&self) -> Vec2 {
        self.position
    }
}

impl<L: Locatable + ?Sized> Locatable for &L {
    fn location(&self) -> Vec2 {
        (**self).location()
    }
}

/// World extent and number of cells per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub width: f32,
    pub height: f32,
    pub resolution: u32,
}

impl GridConfig {
    pub fn new(width: f32, height: f32, resolution: u32) -> Self {
        Self {
            width,
            height,
            resolution,
        }
    }

    pub fn validate(&self) -> Result<(), SpatialError> {
        if self.resolution == 0 {
            return Err(SpatialError::ZeroResolution);
        }
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !(valid(self.width) && valid(self.height)) {
            return Err(SpatialError::InvalidExtent {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Square cell edge: the longer extent split into `resolution` whole units.
    pub fn cell_size(&self) -> f32 {
        (self.width.max(self.height) / self.resolution as f32).ceil()
    }

    pub fn cell_count(&self) -> usize {
        self.resolution as usize * self.resolution as usize
    }
}

impl From<&SimulationConfig> for GridConfig {
    fn from(config: &SimulationConfig) -> Self {
        Self::new(config.width, config.height, config.grid_resolution)
    }
}

/// Column and row of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub x: u32,
    pub y: u32,
}

impl CellCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The cell containing `point`. Points outside the world land in the nearest
    /// border cell.
    pub fn from_point(point: Vec2, cell_size: f32, resolution: u32) -> Self {
        let max = resolution.saturating_sub(1) as i64;
        let axis = |v: f32| ((v / cell_size).floor() as i64).clamp(0, max) as u32;
        Self {
            x: axis(point.x),
            y: axis(point.y),
        }
    }

    /// Row-major bucket index: `x + resolution * y`.
    pub fn index(&self, resolution: u32) -> usize {
        self.x as usize + resolution as usize * self.y as usize
    }

    /// Chebyshev distance in cells
    pub fn distance(&self, other: &CellCoord) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

/// Items bucketed by cell at build time.
///
/// Two neighbour queries are offered:
/// - [`SpatialGrid::query_cell`] looks only at the query point's own cell. It is cheap
///   but **not admissible**: a neighbour within `max_distance` that sits across a cell
///   border is missed.
/// - [`SpatialGrid::query_within`] also scans the ring of
///   `ceil(max_distance / cell_size)` cells around it, so it finds every item within
///   `max_distance`.
#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    config: GridConfig,
    cell_size: f32,
    cells: Vec<Vec<(T, Vec2)>>,
    len: usize,
}

impl<T: Copy> SpatialGrid<T> {
    /// Bucket every `(item, location)` pair. O(items).
    pub fn build<I, L>(config: GridConfig, items: I) -> Result<Self, SpatialError>
    where
        I: IntoIterator<Item = (T, L)>,
        L: Locatable,
    {
        config.validate()?;
        let mut grid = Self {
            config,
            cell_size: config.cell_size(),
            cells: vec![Vec::new(); config.cell_count()],
            len: 0,
        };
        for (item, locatable) in items {
            let location = locatable.location();
            let index = grid.cell_of(location).index(config.resolution);
            grid.cells[index].push((item, location));
            grid.len += 1;
        }
        trace!(items = grid.len, cells = grid.cells.len(), "spatial grid built");
        Ok(grid)
    }

    pub fn cell_of(&self, point: Vec2) -> CellCoord {
        CellCoord::from_point(point, self.cell_size, self.config.resolution)
    }

    /// Items bucketed in one cell. Empty for a coordinate outside the grid.
    pub fn cell(&self, coord: CellCoord) -> &[(T, Vec2)] {
        if coord.x >= self.config.resolution || coord.y >= self.config.resolution {
            return &[];
        }
        &self.cells[coord.index(self.config.resolution)]
    }

    /// Items in the query point's own cell within `max_distance`.
    ///
    /// Inadmissible: neighbours across a cell border are never returned.
    pub fn query_cell(
        &self,
        point: Vec2,
        max_distance: f32,
    ) -> impl Iterator<Item = (T, Vec2)> + '_ {
        let max_sq = max_distance * max_distance;
        let in_range = max_distance >= 0.0;
        self.cell(self.cell_of(point))
            .iter()
            .copied()
            .filter(move |(_, location)| in_range && location.distance_squared(point) <= max_sq)
    }

    /// Every item within `max_distance` of `point`.
    pub fn query_within(
        &self,
        point: Vec2,
        max_distance: f32,
    ) -> impl Iterator<Item = (T, Vec2)> + '_ {
        let max_sq = max_distance * max_distance;
        let in_range = max_distance >= 0.0;
        let ring = if in_range {
            (max_distance / self.cell_size).ceil() as u32
        } else {
            0
        };
        let center = self.cell_of(point);
        self.block(center, ring)
            .filter(move |(_, location)| in_range && location.distance_squared(point) <= max_sq)
    }

    /// Every item inside the axis-aligned rectangle `[min, max]`.
    pub fn within_bounds(&self, min: Vec2, max: Vec2) -> impl Iterator<Item = (T, Vec2)> + '_ {
        let low = self.cell_of(min);
        let high = self.cell_of(max);
        (low.y..=high.y)
            .flat_map(move |y| (low.x..=high.x).map(move |x| CellCoord::new(x, y)))
            .flat_map(move |coord| self.cell(coord).iter().copied())
            .filter(move |(_, location)| {
                location.x >= min.x && location.x <= max.x && location.y >= min.y && location.y <= max.y
            })
    }

    /// All items in the square of cells `ring` steps around `center`.
    fn block(&self, center: CellCoord, ring: u32) -> impl Iterator<Item = (T, Vec2)> + '_ {
        let last = self.config.resolution - 1;
        let (x0, x1) = (center.x.saturating_sub(ring), center.x.saturating_add(ring).min(last));
        let (y0, y1) = (center.y.saturating_sub(ring), center.y.saturating_add(ring).min(last));
        (y0..=y1)
            .flat_map(move |y| (x0..=x1).map(move |x| CellCoord::new(x, y)))
            .flat_map(move |coord| self.cell(coord).iter().copied())
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of bucketed items.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl SpatialGrid<Entity> {
    /// Index every entity holding a [`Position`].
    pub fn from_nexus(nexus: &Nexus, config: GridConfig) -> Result<Self, SpatialError> {
        Self::build(config, nexus.components().iter::<Position>())
    }
}
