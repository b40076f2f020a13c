//! Grid and corner to particle transfer: FLIP velocity update and domain advection.

use phyz_math::{Vector, corner_count};
use rayon::prelude::*;

use crate::cpdi::advect_particle_centers;
use crate::enrichment::ParticleKind;
use crate::error::{ImpmError, Result};
use crate::object::MpmObject;
use crate::solver::InvertibleMpmSolid;

impl<const D: usize> InvertibleMpmSolid<D> {
    /// Add the change of grid and enriched-corner velocities to each
    /// non-Dirichlet particle.
    pub fn update_particle_velocity(&mut self) -> Result<()> {
        self.notify(|o, s| o.on_update_particle_velocity(s));

        let nodes = &self.nodes;
        for (obj_idx, object) in self.objects.iter_mut().enumerate() {
            let MpmObject {
                particles,
                dirichlet,
                mesh,
                interpolation,
            } = object;
            let mesh = &*mesh;
            particles
                .par_iter_mut()
                .zip(dirichlet.par_iter())
                .zip(interpolation.par_iter())
                .enumerate()
                .try_for_each(|(p_idx, ((particle, &fixed), interp))| {
                    if fixed {
                        return Ok(());
                    }
                    let kind =
                        ParticleKind::classify(mesh.enriched_count(p_idx), corner_count::<D>());
                    let mut dv = Vector::<D>::zeros();
                    if kind.uses_grid() {
                        for pair in &interp.grid {
                            let node = &nodes[pair.node];
                            if node.mass_of(obj_idx) <= f64::EPSILON {
                                continue;
                            }
                            let (Some(v), Some(before)) =
                                (node.velocity.get(obj_idx), node.velocity_before.get(obj_idx))
                            else {
                                return Err(ImpmError::MissingGridVelocity {
                                    object: obj_idx,
                                    node: pair.node,
                                });
                            };
                            dv += (v - before) * pair.weight;
                        }
                    }
                    if kind.uses_corners() {
                        for (local, w) in interp.corner_weights.iter().enumerate() {
                            let corner = mesh.corner(mesh.ele_vert_index(p_idx, local));
                            if corner.enriched {
                                dv += (corner.velocity - corner.velocity_before) * *w;
                            }
                        }
                    }
                    particle.v += dv;
                    Ok(())
                })?;
        }
        Ok(())
    }

    /// Move domain corners, then particle centers.
    ///
    /// Enriched corners move with their own velocity, the others with the
    /// grid velocity interpolated at the corner. New positions are written to
    /// the particle domains and the mesh alike.
    pub fn update_particle_position(&mut self, dt: f64) {
        self.notify(|o, s| o.on_update_particle_position(s, dt));

        let nodes = &self.nodes;
        for (obj_idx, object) in self.objects.iter_mut().enumerate() {
            let MpmObject {
                particles,
                dirichlet,
                mesh,
                interpolation,
            } = object;
            for (p_idx, (particle, interp)) in particles.iter_mut().zip(interpolation.iter()).enumerate() {
                for (local, corner_grid) in interp.corner_grid.iter().enumerate() {
                    let vert = mesh.ele_vert_index(p_idx, local);
                    let corner = mesh.corner(vert);
                    let velocity = if corner.enriched {
                        corner.velocity
                    } else {
                        corner_grid.iter().fold(Vector::<D>::zeros(), |acc, nw| {
                            acc + nodes[nw.node].velocity_of(obj_idx) * nw.weight
                        })
                    };
                    let pos = particle.domain[local] + velocity * dt;
                    particle.domain[local] = pos;
                    mesh.set_vert_pos(vert, pos);
                }
            }
            advect_particle_centers(particles, dirichlet);
        }
    }
}
