//! Deduplicated mesh of particle-domain corners.
//!
//! Neighboring particles share domain corners. Each object keeps one mesh
//! whose vertices are the unique corner positions and whose elements are the
//! particle domains. Per-corner transfer data lives next to the vertex
//! position, so it stays aligned with the mesh whenever the mesh is rebuilt.

use std::collections::HashMap;

use phyz_math::{Vector, corner_count};
use smallvec::SmallVec;

/// One shared domain corner.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainCorner<const D: usize> {
    pub position: Vector<D>,
    /// Set when the corner is updated independently of the grid this step.
    pub enriched: bool,
    pub mass: f64,
    /// Momentum during accumulation, velocity once rasterization finishes.
    pub velocity: Vector<D>,
    pub velocity_before: Vector<D>,
}

impl<const D: usize> DomainCorner<D> {
    fn at(position: Vector<D>) -> Self {
        Self {
            position,
            enriched: false,
            mass: 0.0,
            velocity: Vector::<D>::zeros(),
            velocity_before: Vector::<D>::zeros(),
        }
    }

    /// Back to the "not enriched, no mass" state of a fresh step.
    pub fn reset(&mut self) {
        self.enriched = false;
        self.mass = 0.0;
        self.velocity = Vector::<D>::zeros();
        self.velocity_before = Vector::<D>::zeros();
    }
}

/// Quad (2D) or hexahedral (3D) mesh over the domain corners of one object.
#[derive(Debug, Clone, Default)]
pub struct DomainCornerMesh<const D: usize> {
    corners: Vec<DomainCorner<D>>,
    elements: Vec<SmallVec<[usize; 8]>>,
}

impl<const D: usize> DomainCornerMesh<D> {
    /// Build the mesh from per-particle corner lists.
    ///
    /// Corners whose positions agree within `tolerance` (max-norm) become
    /// one vertex; a zero tolerance merges only bit-identical positions.
    pub fn construct<'a, I>(domains: I, tolerance: f64) -> Self
    where
        I: IntoIterator<Item = &'a [Vector<D>]>,
    {
        let mut welder = VertexWelder::new(tolerance);
        let mut corners: Vec<DomainCorner<D>> = Vec::new();
        let mut elements = Vec::new();
        for domain in domains {
            let mut element = SmallVec::new();
            for pos in domain {
                let vert = match welder.find_or_insert(pos, corners.len(), |i| corners[i].position)
                {
                    Some(i) => i,
                    None => {
                        corners.push(DomainCorner::at(*pos));
                        corners.len() - 1
                    }
                };
                element.push(vert);
            }
            elements.push(element);
        }
        Self { corners, elements }
    }

    /// Number of unique corners.
    pub fn vert_num(&self) -> usize {
        self.corners.len()
    }

    /// Number of elements (particles).
    pub fn ele_num(&self) -> usize {
        self.elements.len()
    }

    /// Number of corners of element `ele`.
    pub fn ele_vert_num(&self, ele: usize) -> usize {
        self.elements[ele].len()
    }

    /// Global corner index of local corner `local` of element `ele`.
    #[inline]
    pub fn ele_vert_index(&self, ele: usize, local: usize) -> usize {
        self.elements[ele][local]
    }

    /// Global corner indices of element `ele`.
    pub fn ele_vert_indices(&self, ele: usize) -> &[usize] {
        &self.elements[ele]
    }

    pub fn vert_pos(&self, vert: usize) -> &Vector<D> {
        &self.corners[vert].position
    }

    pub fn set_vert_pos(&mut self, vert: usize, pos: Vector<D>) {
        self.corners[vert].position = pos;
    }

    pub fn set_ele_vert_pos(&mut self, ele: usize, local: usize, pos: Vector<D>) {
        let vert = self.elements[ele][local];
        self.corners[vert].position = pos;
    }

    pub fn corner(&self, vert: usize) -> &DomainCorner<D> {
        &self.corners[vert]
    }

    pub fn corner_mut(&mut self, vert: usize) -> &mut DomainCorner<D> {
        &mut self.corners[vert]
    }

    pub fn corners(&self) -> &[DomainCorner<D>] {
        &self.corners
    }

    pub fn corners_mut(&mut self) -> &mut [DomainCorner<D>] {
        &mut self.corners
    }

    /// Number of enriched corners of element `ele`.
    pub fn enriched_count(&self, ele: usize) -> usize {
        self.elements[ele]
            .iter()
            .filter(|&&v| self.corners[v].enriched)
            .count()
    }

    /// Reset flags, mass and velocities of every corner.
    pub fn reset_corner_data(&mut self) {
        self.corners.iter_mut().for_each(DomainCorner::reset);
    }

    /// True when every element has 2^D corners that index into the vertex list.
    pub fn is_consistent(&self) -> bool {
        self.elements.iter().all(|ele| {
            ele.len() == corner_count::<D>() && ele.iter().all(|&v| v < self.corners.len())
        })
    }
}

/// Spatial hash used to merge coincident corners.
struct VertexWelder<const D: usize> {
    tolerance: f64,
    exact: HashMap<[u64; D], usize>,
    buckets: HashMap<[i64; D], SmallVec<[usize; 2]>>,
}

impl<const D: usize> VertexWelder<D> {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            exact: HashMap::new(),
            buckets: HashMap::new(),
        }
    }

    /// Index of an existing vertex matching `pos`, or `None` after registering
    /// `pos` under `next_index`.
    fn find_or_insert(
        &mut self,
        pos: &Vector<D>,
        next_index: usize,
        position_of: impl Fn(usize) -> Vector<D>,
    ) -> Option<usize> {
        if self.tolerance <= 0.0 {
            // +0.0 and -0.0 are the same corner
            let key = std::array::from_fn(|d| (pos[d] + 0.0).to_bits());
            if let Some(&i) = self.exact.get(&key) {
                return Some(i);
            }
            self.exact.insert(key, next_index);
            return None;
        }

        let cell: [i64; D] = std::array::from_fn(|d| (pos[d] / self.tolerance).floor() as i64);
        for n in 0..3usize.pow(D as u32) {
            let mut neighbor = cell;
            let mut code = n;
            for axis in neighbor.iter_mut() {
                *axis += (code % 3) as i64 - 1;
                code /= 3;
            }
            if let Some(candidates) = self.buckets.get(&neighbor) {
                for &i in candidates {
                    if (position_of(i) - pos).amax() <= self.tolerance {
                        return Some(i);
                    }
                }
            }
        }
        self.buckets.entry(cell).or_default().push(next_index);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phyz_math::Vec2;

    fn unit_square(offset: Vec2) -> Vec<Vec2> {
        vec![
            offset,
            offset + Vec2::new(1.0, 0.0),
            offset + Vec2::new(0.0, 1.0),
            offset + Vec2::new(1.0, 1.0),
        ]
    }

    #[test]
    fn test_shared_corners_are_merged() {
        let a = unit_square(Vec2::zeros());
        let b = unit_square(Vec2::new(1.0, 0.0));
        let mesh = DomainCornerMesh::construct([a.as_slice(), b.as_slice()], 0.0);
        assert_eq!(mesh.ele_num(), 2);
        assert_eq!(mesh.vert_num(), 6);
        // right edge of a is the left edge of b
        assert_eq!(mesh.ele_vert_index(0, 1), mesh.ele_vert_index(1, 0));
        assert_eq!(mesh.ele_vert_index(0, 3), mesh.ele_vert_index(1, 2));
        assert!(mesh.is_consistent());
    }

    #[test]
    fn test_signed_zero_is_one_corner() {
        let a = [Vec2::new(0.0, 0.0)];
        let b = [Vec2::new(-0.0, 0.0)];
        let mesh = DomainCornerMesh::construct([&a[..], &b[..]], 0.0);
        assert_eq!(mesh.vert_num(), 1);
    }

    #[test]
    fn test_tolerance_welding() {
        let a = unit_square(Vec2::zeros());
        let b = unit_square(Vec2::new(1.0 + 1e-9, 0.0));
        let exact = DomainCornerMesh::construct([a.as_slice(), b.as_slice()], 0.0);
        assert_eq!(exact.vert_num(), 8);
        let welded = DomainCornerMesh::construct([a.as_slice(), b.as_slice()], 1e-6);
        assert_eq!(welded.vert_num(), 6);
    }

    #[test]
    fn test_set_positions_and_reset() {
        let a = unit_square(Vec2::zeros());
        let mut mesh = DomainCornerMesh::construct([a.as_slice()], 0.0);
        mesh.set_ele_vert_pos(0, 3, Vec2::new(2.0, 2.0));
        assert_eq!(mesh.vert_pos(mesh.ele_vert_index(0, 3)), &Vec2::new(2.0, 2.0));

        let corner = mesh.corner_mut(0);
        corner.enriched = true;
        corner.mass = 1.0;
        assert_eq!(mesh.enriched_count(0), 1);
        mesh.reset_corner_data();
        assert_eq!(mesh.enriched_count(0), 0);
        assert_eq!(mesh.corner(0).mass, 0.0);
    }
}
