//! Spatial indexing abstractions for agent neighborhood queries.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Common behaviour exposed by neighborhood indices.
pub trait NeighborhoodIndex {
    /// Rebuild internal structures from agent positions.
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError>;

    /// Visit neighbors of `agent_idx` within the provided squared radius.
    ///
    /// The agent itself is never reported. Visit order is unspecified; callers
    /// that need ordering sort on the reported squared distance.
    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    );
}

/// Uniform grid index bucketing agents by cell.
///
/// Positions outside the declared extents are clamped into the edge cells, so
/// the index stays usable even when a caller hands it slightly out-of-bounds
/// coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformGridIndex {
    cell_size: f32,
    cols: usize,
    rows: usize,
    #[serde(skip)]
    buckets: Vec<Vec<usize>>,
    #[serde(skip)]
    positions: Vec<(f32, f32)>,
}

impl UniformGridIndex {
    /// Create a grid covering `width x height` world units.
    #[must_use]
    pub fn new(cell_size: f32, width: f32, height: f32) -> Self {
        let cols = if cell_size > 0.0 {
            ((width / cell_size).ceil() as usize).max(1)
        } else {
            1
        };
        let rows = if cell_size > 0.0 {
            ((height / cell_size).ceil() as usize).max(1)
        } else {
            1
        };
        Self {
            cell_size,
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
            positions: Vec::new(),
        }
    }

    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn cell_of(&self, x: f32, y: f32) -> (usize, usize) {
        let col = ((x / self.cell_size).floor() as isize).clamp(0, self.cols as isize - 1);
        let row = ((y / self.cell_size).floor() as isize).clamp(0, self.rows as isize - 1);
        (col as usize, row as usize)
    }
}

impl NeighborhoodIndex for UniformGridIndex {
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError> {
        if self.cell_size <= 0.0 {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        if self.buckets.len() != self.cols * self.rows {
            self.buckets.resize(self.cols * self.rows, Vec::new());
        }
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        for (idx, &(x, y)) in positions.iter().enumerate() {
            let (col, row) = self.cell_of(x, y);
            self.buckets[row * self.cols + col].push(idx);
        }
        Ok(())
    }

    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let Some(&(x, y)) = self.positions.get(agent_idx) else {
            return;
        };
        let reach = (radius_sq.sqrt() / self.cell_size).ceil() as isize;
        let (col, row) = self.cell_of(x, y);
        let col = col as isize;
        let row = row as isize;
        for dr in -reach..=reach {
            let r = row + dr;
            if r < 0 || r >= self.rows as isize {
                continue;
            }
            for dc in -reach..=reach {
                let c = col + dc;
                if c < 0 || c >= self.cols as isize {
                    continue;
                }
                for &other in &self.buckets[r as usize * self.cols + c as usize] {
                    if other == agent_idx {
                        continue;
                    }
                    let (ox, oy) = self.positions[other];
                    let dx = ox - x;
                    let dy = oy - y;
                    let dist_sq = dx * dx + dy * dy;
                    if dist_sq <= radius_sq {
                        visitor(other, OrderedFloat(dist_sq));
                    }
                }
            }
        }
    }
}

/// All-pairs scan kept as the reference oracle for grid parity tests.
#[derive(Debug, Clone, Default)]
pub struct BruteForceIndex {
    positions: Vec<(f32, f32)>,
}

impl BruteForceIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NeighborhoodIndex for BruteForceIndex {
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError> {
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        Ok(())
    }

    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let Some(&(x, y)) = self.positions.get(agent_idx) else {
            return;
        };
        for (other, &(ox, oy)) in self.positions.iter().enumerate() {
            if other == agent_idx {
                continue;
            }
            let dx = ox - x;
            let dy = oy - y;
            let dist_sq = dx * dx + dy * dy;
            if dist_sq <= radius_sq {
                visitor(other, OrderedFloat(dist_sq));
            }
        }
    }
}
