//! CPDI2 interpolation over quadrilateral/hexahedral particle domains.
//!
//! A particle's influence region is the multilinear element spanned by its
//! 2^D domain corners. Corner weights and gradients are domain averages of
//! the element shape functions:
//!
//! ```text
//! w_c  = (1/V) ∫ φ_c dΩ        ∇w_c = (1/V) ∫ ∇φ_c dΩ
//! ```
//!
//! evaluated with 2^D-point Gauss quadrature. Grid weights of the particle
//! follow by evaluating the grid basis at the corners:
//! `w_ip = Σ_c w_c N_i(x_c)` and `∇w_ip = Σ_c ∇w_c N_i(x_c)`.

use phyz_math::{Matrix, Vector, corner_count, corner_signs, determinant};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::grid::{NodeWeight, UniformGrid};
use crate::particle::SolidParticle;

/// Corner weights and gradients of one particle domain.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainWeights<const D: usize> {
    pub weights: SmallVec<[f64; 8]>,
    pub gradients: SmallVec<[Vector<D>; 8]>,
    /// Signed domain volume.
    pub volume: f64,
}

/// Shape function of corner `c` and its reference-space gradient at `xi`.
fn shape<const D: usize>(c: usize, xi: &Vector<D>) -> (f64, Vector<D>) {
    let s = corner_signs::<D>(c);
    let factors = Vector::<D>::from_fn(|d, _| 0.5 * (1.0 + s[d] * xi[d]));
    let value: f64 = factors.iter().product();
    let gradient = Vector::<D>::from_fn(|b, _| {
        (0..D)
            .map(|d| if d == b { 0.5 * s[d] } else { factors[d] })
            .product::<f64>()
    });
    (value, gradient)
}

/// CPDI2 corner weights of the domain spanned by `corners`.
///
/// A domain with non-positive volume has no meaningful gradients; it gets
/// uniform weights and zero gradients so the particle still carries mass.
pub fn domain_weights<const D: usize>(corners: &[Vector<D>]) -> DomainWeights<D> {
    let n = corner_count::<D>();
    debug_assert_eq!(corners.len(), n);
    let gauss = 1.0 / 3.0f64.sqrt();

    let mut weights: SmallVec<[f64; 8]> = SmallVec::from_elem(0.0, n);
    let mut gradients: SmallVec<[Vector<D>; 8]> = SmallVec::from_elem(Vector::<D>::zeros(), n);
    let mut volume = 0.0;

    for q in 0..n {
        let xi = corner_signs::<D>(q) * gauss;
        let shapes: SmallVec<[(f64, Vector<D>); 8]> = (0..n).map(|c| shape(c, &xi)).collect();

        // J_ab = ∂x_a / ∂ξ_b
        let mut jacobian = Matrix::<D>::zeros();
        for (x, (_, dphi)) in corners.iter().zip(shapes.iter()) {
            jacobian += x * dphi.transpose();
        }
        let det_j = determinant(&jacobian);
        volume += det_j;

        let inv_t = jacobian.try_inverse().map(|inv| inv.transpose());
        for (c, (phi, dphi)) in shapes.iter().enumerate() {
            weights[c] += phi * det_j;
            if let Some(inv_t) = &inv_t {
                gradients[c] += inv_t * dphi * det_j;
            }
        }
    }

    if volume <= f64::EPSILON {
        log::warn!("degenerate particle domain (volume {volume:e}), using uniform corner weights");
        return DomainWeights {
            weights: SmallVec::from_elem(1.0 / n as f64, n),
            gradients: SmallVec::from_elem(Vector::<D>::zeros(), n),
            volume,
        };
    }

    for w in weights.iter_mut() {
        *w /= volume;
    }
    for g in gradients.iter_mut() {
        *g /= volume;
    }
    DomainWeights {
        weights,
        gradients,
        volume,
    }
}

/// Everything the transfer phases need to know about one particle's support.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleInterpolation<const D: usize> {
    /// Particle-grid weights and gradients.
    pub grid: Vec<NodeWeight<D>>,
    /// Particle-corner weights, one per local corner.
    pub corner_weights: SmallVec<[f64; 8]>,
    /// Particle-corner weight gradients, one per local corner.
    pub corner_gradients: SmallVec<[Vector<D>; 8]>,
    /// Grid weights of each corner position, used to advect ordinary corners.
    pub corner_grid: SmallVec<[SmallVec<[NodeWeight<D>; 8]>; 8]>,
}

impl<const D: usize> Default for ParticleInterpolation<D> {
    fn default() -> Self {
        Self {
            grid: Vec::new(),
            corner_weights: SmallVec::from_elem(0.0, corner_count::<D>()),
            corner_gradients: SmallVec::from_elem(Vector::<D>::zeros(), corner_count::<D>()),
            corner_grid: SmallVec::from_elem(SmallVec::new(), corner_count::<D>()),
        }
    }
}

impl<const D: usize> ParticleInterpolation<D> {
    /// Compute the CPDI2 interpolation data of the domain spanned by `corners`.
    pub fn compute(grid: &UniformGrid<D>, corners: &[Vector<D>]) -> Self {
        let domain = domain_weights(corners);
        let corner_grid: SmallVec<[SmallVec<[NodeWeight<D>; 8]>; 8]> =
            corners.iter().map(|x| grid.linear_weights(x)).collect();

        let mut pairs: Vec<NodeWeight<D>> = Vec::new();
        for ((w_c, grad_c), nodes) in domain
            .weights
            .iter()
            .zip(domain.gradients.iter())
            .zip(corner_grid.iter())
        {
            for n in nodes {
                let i = match pairs.iter().position(|p| p.node == n.node) {
                    Some(i) => i,
                    None => {
                        pairs.push(NodeWeight {
                            node: n.node,
                            weight: 0.0,
                            gradient: Vector::<D>::zeros(),
                        });
                        pairs.len() - 1
                    }
                };
                pairs[i].weight += w_c * n.weight;
                pairs[i].gradient += grad_c * n.weight;
            }
        }
        pairs.retain(|p| p.weight > f64::EPSILON);
        pairs.sort_by_key(|p| p.node);

        Self {
            grid: pairs,
            corner_weights: domain.weights,
            corner_gradients: domain.gradients,
            corner_grid,
        }
    }
}

/// Particle center implied by its domain: `Σ_c w_c x_c`, the domain centroid.
pub fn domain_center<const D: usize>(corners: &[Vector<D>]) -> Vector<D> {
    let domain = domain_weights(corners);
    corners
        .iter()
        .zip(domain.weights.iter())
        .fold(Vector::<D>::zeros(), |acc, (x, w)| acc + x * *w)
}

/// Move every particle whose `fixed` flag is unset to the center of its domain.
pub fn advect_particle_centers<const D: usize>(particles: &mut [SolidParticle<D>], fixed: &[bool]) {
    debug_assert_eq!(particles.len(), fixed.len());
    particles
        .par_iter_mut()
        .zip(fixed.par_iter())
        .filter(|(_, fixed)| !**fixed)
        .for_each(|(p, _)| p.x = domain_center(&p.domain));
}
