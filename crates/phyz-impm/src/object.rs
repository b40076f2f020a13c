//! A simulated object: particles sharing a domain-corner mesh.

use rayon::prelude::*;

use phyz_math::{Vector, corner_count};

use crate::cpdi::ParticleInterpolation;
use crate::domain_mesh::DomainCornerMesh;
use crate::enrichment::{EnrichmentCriterion, ParticleKind};
use crate::grid::UniformGrid;
use crate::particle::SolidParticle;

/// Particles of one object together with their domain mesh and
/// interpolation data. All per-particle vectors are index-aligned.
#[derive(Debug, Clone)]
pub struct MpmObject<const D: usize> {
    pub(crate) particles: Vec<SolidParticle<D>>,
    pub(crate) dirichlet: Vec<bool>,
    pub(crate) mesh: DomainCornerMesh<D>,
    pub(crate) interpolation: Vec<ParticleInterpolation<D>>,
}

impl<const D: usize> MpmObject<D> {
    pub(crate) fn new(particles: Vec<SolidParticle<D>>) -> Self {
        let n = particles.len();
        Self {
            particles,
            dirichlet: vec![false; n],
            mesh: DomainCornerMesh::default(),
            interpolation: vec![ParticleInterpolation::default(); n],
        }
    }

    pub fn particles(&self) -> &[SolidParticle<D>] {
        &self.particles
    }

    pub fn particle(&self, idx: usize) -> Option<&SolidParticle<D>> {
        self.particles.get(idx)
    }

    pub fn particle_num(&self) -> usize {
        self.particles.len()
    }

    pub fn domain_mesh(&self) -> &DomainCornerMesh<D> {
        &self.mesh
    }

    pub fn interpolation(&self, idx: usize) -> Option<&ParticleInterpolation<D>> {
        self.interpolation.get(idx)
    }

    pub fn is_dirichlet_particle(&self, idx: usize) -> bool {
        self.dirichlet.get(idx).copied().unwrap_or(false)
    }

    /// Classification of particle `idx` from the current enrichment flags.
    pub fn particle_kind(&self, idx: usize) -> ParticleKind {
        ParticleKind::classify(self.mesh.enriched_count(idx), corner_count::<D>())
    }

    /// Number of enriched corners in the mesh.
    pub fn enriched_corner_num(&self) -> usize {
        self.mesh.corners().iter().filter(|c| c.enriched).count()
    }

    /// Rebuild the domain mesh from the particles' current corners.
    pub(crate) fn rebuild_domain_mesh(&mut self, tolerance: f64) {
        self.mesh = DomainCornerMesh::construct(
            self.particles.iter().map(|p| p.domain.as_slice()),
            tolerance,
        );
        debug_assert!(self.mesh.is_consistent());
    }

    /// Move mesh vertex `vert` and every particle corner that refers to it.
    pub(crate) fn move_corner(&mut self, vert: usize, pos: Vector<D>) {
        self.mesh.set_vert_pos(vert, pos);
        for (idx, particle) in self.particles.iter_mut().enumerate() {
            for (local, &v) in self.mesh.ele_vert_indices(idx).iter().enumerate() {
                if v == vert {
                    particle.domain[local] = pos;
                }
            }
        }
    }

    /// Recompute CPDI2 weights for every particle.
    pub(crate) fn refresh_interpolation(&mut self, grid: &UniformGrid<D>) {
        self.interpolation = self
            .particles
            .par_iter()
            .map(|p| ParticleInterpolation::compute(grid, &p.domain))
            .collect();
    }

    /// Reset every corner to "not enriched", then enrich all corners of the
    /// particles satisfying `criterion`.
    pub(crate) fn update_enrichment_state(
        &mut self,
        object: usize,
        criterion: &dyn EnrichmentCriterion<D>,
    ) {
        for corner in self.mesh.corners_mut() {
            corner.enriched = false;
        }
        for (idx, particle) in self.particles.iter().enumerate() {
            if !criterion.is_satisfied(object, idx, particle) {
                continue;
            }
            for local in 0..self.mesh.ele_vert_num(idx) {
                let vert = self.mesh.ele_vert_index(idx, local);
                self.mesh.corner_mut(vert).enriched = true;
            }
        }
    }
}
