//! Particle to grid and enriched-corner transfer.

use phyz_math::{Vector, corner_count};
use smallvec::SmallVec;

use crate::enrichment::ParticleKind;
use crate::object::MpmObject;
use crate::solver::InvertibleMpmSolid;

impl<const D: usize> InvertibleMpmSolid<D> {
    /// Flag the domain corners of every particle that satisfies the
    /// enrichment criterion. All flags are cleared first.
    pub fn update_enrichment_state(&mut self) {
        let criterion = self.criterion.as_ref();
        for (idx, object) in self.objects.iter_mut().enumerate() {
            object.update_enrichment_state(idx, criterion);
        }
    }

    /// Transfer particle mass and momentum to grid nodes and enriched corners.
    ///
    /// Grid velocities of Dirichlet (node, object) pairs keep their prescribed
    /// value. Without a contact model, objects sharing a node end up with one
    /// common mass and velocity there.
    pub fn rasterize(&mut self) {
        self.notify(|o, s| o.on_rasterize(s));

        for node in self.nodes.iter_mut() {
            node.reset();
        }
        self.active_nodes.clear();
        for object in self.objects.iter_mut() {
            object.mesh.reset_corner_data();
        }
        self.update_enrichment_state();

        let nodes = &mut self.nodes;
        for (obj_idx, object) in self.objects.iter_mut().enumerate() {
            let MpmObject {
                particles,
                mesh,
                interpolation,
                ..
            } = object;
            for (p_idx, (particle, interp)) in particles.iter().zip(interpolation.iter()).enumerate() {
                let kind = ParticleKind::classify(mesh.enriched_count(p_idx), corner_count::<D>());
                if kind.uses_grid() {
                    for pair in &interp.grid {
                        let node = &mut nodes[pair.node];
                        let m = pair.weight * particle.mass;
                        *node.mass.get_or_insert_with(obj_idx, || 0.0) += m;
                        if !node.is_dirichlet(obj_idx) {
                            *node.velocity.get_or_insert_with(obj_idx, Vector::<D>::zeros) +=
                                particle.v * m;
                        }
                    }
                }
                if kind.uses_corners() {
                    for (local, w) in interp.corner_weights.iter().enumerate() {
                        let corner = mesh.corner_mut(mesh.ele_vert_index(p_idx, local));
                        if !corner.enriched {
                            continue;
                        }
                        let m = w * particle.mass;
                        corner.mass += m;
                        corner.velocity += particle.v * m;
                    }
                }
            }

            for corner in mesh.corners_mut() {
                if corner.mass > f64::EPSILON {
                    corner.velocity /= corner.mass;
                    corner.velocity_before = corner.velocity;
                }
            }
        }

        for (flat, node) in self.nodes.iter_mut().enumerate() {
            let mut active: SmallVec<[usize; 2]> = SmallVec::new();
            for (object, &mass) in node.mass.iter() {
                debug_assert!(mass >= 0.0, "negative grid mass {mass} at node {flat}");
                if mass > f64::EPSILON {
                    active.push(object);
                }
            }
            if active.is_empty() {
                continue;
            }
            for &object in &active {
                if !node.is_dirichlet(object) {
                    let mass = node.mass_of(object);
                    if let Some(v) = node.velocity.get_mut(object) {
                        *v /= mass;
                    }
                }
                let v = node.velocity_of(object);
                node.velocity_before.insert(object, v);
            }
            self.active_nodes.insert(flat, active);
        }

        if self.contact.is_none() {
            self.unify_shared_nodes();
        }

        log::debug!(
            "rasterized {} objects onto {} active grid nodes",
            self.objects.len(),
            self.active_nodes.len()
        );
    }

    /// Weld objects that share a grid node: one total mass and one
    /// momentum-weighted velocity for all of them. A Dirichlet prescription
    /// by any of them (lowest object index first) overrides the velocity.
    fn unify_shared_nodes(&mut self) {
        for (&flat, objects) in self.active_nodes.iter() {
            if objects.len() < 2 {
                continue;
            }
            let node = &mut self.nodes[flat];
            let mut mass = 0.0;
            let mut momentum = Vector::<D>::zeros();
            for &object in objects {
                let m = node.mass_of(object);
                mass += m;
                momentum += node.velocity_of(object) * m;
            }
            let velocity = objects
                .iter()
                .find_map(|&object| node.dirichlet.get(object).copied())
                .unwrap_or(momentum / mass);
            for &object in objects {
                node.mass.insert(object, mass);
                node.velocity.insert(object, velocity);
                node.velocity_before.insert(object, velocity);
            }
        }
    }
}
