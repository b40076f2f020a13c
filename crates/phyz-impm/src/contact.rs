//! Hook for an external grid contact model.
//!
//! Without a contact model, objects that share a grid node are welded there:
//! rasterization unifies their mass and velocity and forces are applied to all
//! of them. Installing a [`GridContactMethod`] keeps per-object values apart
//! and hands them to the model after the grid solve.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::grid::{GridNodeState, UniformGrid};

/// Flat node index to the sorted indices of objects with mass at that node.
pub type ActiveGridNodes = BTreeMap<usize, SmallVec<[usize; 2]>>;

/// Resolves contact between objects on the grid after the explicit solve.
pub trait GridContactMethod<const D: usize> {
    fn resolve_contact(
        &mut self,
        grid: &UniformGrid<D>,
        nodes: &mut [GridNodeState<D>],
        active_nodes: &ActiveGridNodes,
        dt: f64,
    );
}
