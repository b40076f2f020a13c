//! Uniform background grid and per-node, per-object state.

use phyz_math::{Vector, corner_count, corner_offsets};
use smallvec::SmallVec;

use crate::config::GridConfig;
use crate::error::{ImpmError, Result};
use crate::object_map::ObjectMap;

/// Weight and weight gradient of one grid node with respect to a sample point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeWeight<const D: usize> {
    /// Flat node index.
    pub node: usize,
    pub weight: f64,
    pub gradient: Vector<D>,
}

/// Axis-aligned uniform grid of `cells + 1` nodes per axis.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformGrid<const D: usize> {
    origin: Vector<D>,
    dx: f64,
    node_num: [usize; D],
}

impl<const D: usize> UniformGrid<D> {
    /// Create a grid with `cells[d]` cells of size `dx` along axis `d`.
    pub fn new(origin: Vector<D>, dx: f64, cells: [usize; D]) -> Self {
        Self {
            origin,
            dx,
            node_num: cells.map(|n| n + 1),
        }
    }

    /// Build from config, checking that it describes a `D`-dimensional grid.
    pub fn from_config(config: &GridConfig) -> Result<Self> {
        if config.origin.len() != D || config.cells.len() != D {
            return Err(ImpmError::InvalidParameter(format!(
                "grid config is {}-dimensional, solver is {}-dimensional",
                config.origin.len(),
                D
            )));
        }
        if !(config.cell_size > 0.0) {
            return Err(ImpmError::InvalidParameter(format!(
                "grid cell size must be positive, got {}",
                config.cell_size
            )));
        }
        Ok(Self::new(
            Vector::<D>::from_column_slice(&config.origin),
            config.cell_size,
            std::array::from_fn(|d| config.cells[d]),
        ))
    }

    pub fn origin(&self) -> &Vector<D> {
        &self.origin
    }

    /// Cell edge length.
    pub fn dx(&self) -> f64 {
        self.dx
    }

    /// Nodes per axis.
    pub fn node_num(&self) -> [usize; D] {
        self.node_num
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.node_num.iter().product()
    }

    /// Flat index, axis 0 varying fastest.
    pub fn flat_index(&self, idx: [usize; D]) -> usize {
        let mut flat = 0;
        for d in (0..D).rev() {
            flat = flat * self.node_num[d] + idx[d];
        }
        flat
    }

    /// Inverse of [`flat_index`](Self::flat_index).
    pub fn node_index(&self, mut flat: usize) -> [usize; D] {
        let mut idx = [0; D];
        for d in 0..D {
            idx[d] = flat % self.node_num[d];
            flat /= self.node_num[d];
        }
        idx
    }

    pub fn node_position(&self, idx: [usize; D]) -> Vector<D> {
        Vector::<D>::from_fn(|d, _| self.origin[d] + idx[d] as f64 * self.dx)
    }

    /// Multilinear (tent) weights of the cell containing `x`.
    ///
    /// Nodes outside the grid and nodes with zero weight are omitted.
    pub fn linear_weights(&self, x: &Vector<D>) -> SmallVec<[NodeWeight<D>; 8]> {
        let local = (x - self.origin) / self.dx;
        let mut base = [0i64; D];
        let mut frac = [0.0; D];
        for d in 0..D {
            let b = local[d].floor();
            base[d] = b as i64;
            frac[d] = local[d] - b;
        }

        let mut out = SmallVec::new();
        'corners: for corner in 0..corner_count::<D>() {
            let offsets = corner_offsets::<D>(corner);
            let mut idx = [0usize; D];
            // 1D factors and their derivatives along each axis
            let mut n = [0.0; D];
            let mut dn = [0.0; D];
            for d in 0..D {
                let i = base[d] + offsets[d] as i64;
                if i < 0 || i as usize >= self.node_num[d] {
                    continue 'corners;
                }
                idx[d] = i as usize;
                if offsets[d] == 0 {
                    n[d] = 1.0 - frac[d];
                    dn[d] = -1.0 / self.dx;
                } else {
                    n[d] = frac[d];
                    dn[d] = 1.0 / self.dx;
                }
            }
            let weight: f64 = n.iter().product();
            if weight <= f64::EPSILON {
                continue;
            }
            let gradient = Vector::<D>::from_fn(|a, _| {
                (0..D)
                    .map(|b| if a == b { dn[b] } else { n[b] })
                    .product::<f64>()
            });
            out.push(NodeWeight {
                node: self.flat_index(idx),
                weight,
                gradient,
            });
        }
        out
    }
}

/// Per-object values stored at one grid node.
#[derive(Debug, Clone, PartialEq)]
pub struct GridNodeState<const D: usize> {
    pub mass: ObjectMap<f64>,
    /// Momentum during accumulation, velocity once rasterization finishes.
    pub velocity: ObjectMap<Vector<D>>,
    pub velocity_before: ObjectMap<Vector<D>>,
    /// Prescribed velocity for objects that treat this node as a boundary.
    pub dirichlet: ObjectMap<Vector<D>>,
}

impl<const D: usize> Default for GridNodeState<D> {
    fn default() -> Self {
        Self {
            mass: ObjectMap::new(),
            velocity: ObjectMap::new(),
            velocity_before: ObjectMap::new(),
            dirichlet: ObjectMap::new(),
        }
    }
}

impl<const D: usize> GridNodeState<D> {
    /// Clear accumulated data. Dirichlet nodes keep their prescribed velocity.
    pub fn reset(&mut self) {
        self.mass.clear();
        self.velocity.clear();
        self.velocity_before.clear();
        for (object, v) in self.dirichlet.iter() {
            self.velocity.insert(object, *v);
        }
    }

    pub fn is_dirichlet(&self, object: usize) -> bool {
        self.dirichlet.contains(object)
    }

    /// Mass of `object` at this node, zero if absent.
    pub fn mass_of(&self, object: usize) -> f64 {
        self.mass.get(object).copied().unwrap_or(0.0)
    }

    /// Velocity of `object` at this node, zero if absent.
    pub fn velocity_of(&self, object: usize) -> Vector<D> {
        self.velocity.get(object).copied().unwrap_or_else(Vector::<D>::zeros)
    }

    pub(crate) fn remove_object(&mut self, object: usize) {
        self.mass.remove_object(object);
        self.velocity.remove_object(object);
        self.velocity_before.remove_object(object);
        self.dirichlet.remove_object(object);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use phyz_math::{Vec2, Vec3};

    #[test]
    fn test_flat_index_round_trip() {
        let grid = UniformGrid::<3>::new(Vec3::zeros(), 0.5, [3, 4, 5]);
        assert_eq!(grid.node_count(), 4 * 5 * 6);
        let idx = [2, 3, 4];
        assert_eq!(grid.node_index(grid.flat_index(idx)), idx);
        assert_eq!(grid.flat_index([1, 0, 0]), 1);
        assert_eq!(grid.flat_index([0, 1, 0]), 4);
    }

    #[test]
    fn test_linear_weights_partition_of_unity() {
        let grid = UniformGrid::<2>::new(Vec2::zeros(), 1.0, [4, 4]);
        let weights = grid.linear_weights(&Vec2::new(1.25, 2.5));
        assert_eq!(weights.len(), 4);
        let sum: f64 = weights.iter().map(|w| w.weight).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        let grad_sum: Vec2 = weights.iter().map(|w| w.gradient).sum();
        assert_relative_eq!(grad_sum.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_weight_values() {
        let grid = UniformGrid::<2>::new(Vec2::zeros(), 2.0, [2, 2]);
        let weights = grid.linear_weights(&Vec2::new(0.5, 0.0));
        // y sits exactly on a node row, so only the two nodes of that row remain
        assert_eq!(weights.len(), 2);
        let w0 = weights.iter().find(|w| w.node == grid.flat_index([0, 0])).unwrap();
        assert_relative_eq!(w0.weight, 0.75);
        assert_relative_eq!(w0.gradient.x, -0.5);
        assert_relative_eq!(w0.gradient.y, -0.375);
    }

    #[test]
    fn test_weights_outside_grid_are_dropped() {
        let grid = UniformGrid::<2>::new(Vec2::zeros(), 1.0, [2, 2]);
        assert!(grid.linear_weights(&Vec2::new(-3.0, -3.0)).is_empty());
    }

    #[test]
    fn test_dirichlet_velocity_survives_reset() {
        let mut node = GridNodeState::<2>::default();
        node.dirichlet.insert(1, Vec2::new(0.0, 2.0));
        node.mass.insert(0, 1.0);
        node.reset();
        assert!(node.mass.is_empty());
        assert_eq!(node.velocity_of(1), Vec2::new(0.0, 2.0));
        assert_eq!(node.velocity_of(0), Vec2::zeros());
    }
}
